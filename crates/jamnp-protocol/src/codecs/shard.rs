//! CE137 — Shard distribution, CE138 — Audit-shard request,
//! CE139/CE140 — Segment-shard request.
//!
//! CE137 and CE138 share the same request shape (`erasureRoot‖shardIdx`);
//! CE139 and CE140 share the same request and response shapes, differing
//! only in whether the response's justification sequence is populated
//! (spec.md §9 open question 3: response correlation for these keys off
//! `(stream_kind, erasure_root)`, not FIFO — see [`crate::handler`]).

use jamnp_core::error::CodecError;
use jamnp_core::ids::Hash;

use super::{decode_blob, decode_seq, encode_blob, encode_seq, take_fixed};

/// `erasureRoot(32) ‖ shardIdx(4 LE)` — CE137 and CE138's request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardRequest {
    pub erasure_root: Hash,
    pub shard_index: u32,
}

pub fn encode_shard_request(req: &ShardRequest) -> Vec<u8> {
    let mut out = Vec::with_capacity(36);
    out.extend_from_slice(&req.erasure_root);
    out.extend_from_slice(&req.shard_index.to_le_bytes());
    out
}

pub fn decode_shard_request(buf: &[u8]) -> Result<ShardRequest, CodecError> {
    let (erasure_root, rest) = take_fixed::<32>(buf, "ShardRequest.erasure_root")?;
    let (idx_bytes, _rest) = take_fixed::<4>(rest, "ShardRequest.shard_index")?;
    Ok(ShardRequest { erasure_root, shard_index: u32::from_le_bytes(idx_bytes) })
}

/// CE137 response: `len‖bundle ‖ len‖(len‖seg)* ‖ len‖just`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShardDistributionResponse {
    pub bundle: Vec<u8>,
    pub segments: Vec<Vec<u8>>,
    pub justification: Vec<u8>,
}

pub fn encode_shard_distribution_response(resp: &ShardDistributionResponse) -> Vec<u8> {
    let mut out = encode_blob(&resp.bundle);
    out.extend(encode_seq(&resp.segments, |s| encode_blob(s)));
    out.extend(encode_blob(&resp.justification));
    out
}

pub fn decode_shard_distribution_response(buf: &[u8]) -> Result<ShardDistributionResponse, CodecError> {
    let (bundle, c1) = decode_blob(buf)?;
    let (segments, c2) = decode_seq(&buf[c1..], |b| decode_blob(b))?;
    let (justification, _c3) = decode_blob(&buf[c1 + c2..])?;
    Ok(ShardDistributionResponse { bundle, segments, justification })
}

/// CE138 response: `len‖bundle ‖ len‖just`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuditShardResponse {
    pub bundle: Vec<u8>,
    pub justification: Vec<u8>,
}

pub fn encode_audit_shard_response(resp: &AuditShardResponse) -> Vec<u8> {
    let mut out = encode_blob(&resp.bundle);
    out.extend(encode_blob(&resp.justification));
    out
}

pub fn decode_audit_shard_response(buf: &[u8]) -> Result<AuditShardResponse, CodecError> {
    let (bundle, consumed) = decode_blob(buf)?;
    let (justification, _consumed) = decode_blob(&buf[consumed..])?;
    Ok(AuditShardResponse { bundle, justification })
}

/// One `(erasureRoot‖shardIdx‖len‖segIdx*)` entry of a CE139/CE140 request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentShardRequestItem {
    pub erasure_root: Hash,
    pub shard_index: u32,
    pub segment_indices: Vec<u32>,
}

/// `len‖(erasureRoot‖shardIdx‖len‖segIdx*)*`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SegmentShardRequest {
    pub items: Vec<SegmentShardRequestItem>,
}

fn encode_segment_index(i: &u32) -> Vec<u8> {
    i.to_le_bytes().to_vec()
}

fn decode_segment_index(buf: &[u8]) -> Result<(u32, usize), CodecError> {
    let (bytes, _rest) = take_fixed::<4>(buf, "segment index")?;
    Ok((u32::from_le_bytes(bytes), 4))
}

fn encode_segment_request_item(item: &SegmentShardRequestItem) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&item.erasure_root);
    out.extend_from_slice(&item.shard_index.to_le_bytes());
    out.extend(encode_seq(&item.segment_indices, encode_segment_index));
    out
}

fn decode_segment_request_item(buf: &[u8]) -> Result<(SegmentShardRequestItem, usize), CodecError> {
    let (erasure_root, rest) = take_fixed::<32>(buf, "SegmentShardRequestItem.erasure_root")?;
    let (idx_bytes, rest) = take_fixed::<4>(rest, "SegmentShardRequestItem.shard_index")?;
    let (segment_indices, consumed) = decode_seq(rest, decode_segment_index)?;
    Ok((
        SegmentShardRequestItem { erasure_root, shard_index: u32::from_le_bytes(idx_bytes), segment_indices },
        32 + 4 + consumed,
    ))
}

pub fn encode_segment_request(req: &SegmentShardRequest) -> Vec<u8> {
    encode_seq(&req.items, encode_segment_request_item)
}

pub fn decode_segment_request(buf: &[u8]) -> Result<SegmentShardRequest, CodecError> {
    let (items, _consumed) = decode_seq(buf, decode_segment_request_item)?;
    Ok(SegmentShardRequest { items })
}

/// `len‖seg* ‖ len‖just*` — CE139 always encodes an empty justification
/// sequence; CE140 populates it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SegmentShardResponse {
    pub segments: Vec<Vec<u8>>,
    pub justifications: Vec<Vec<u8>>,
}

pub fn encode_segment_response(resp: &SegmentShardResponse) -> Vec<u8> {
    let mut out = encode_seq(&resp.segments, |s| encode_blob(s));
    out.extend(encode_seq(&resp.justifications, |j| encode_blob(j)));
    out
}

pub fn decode_segment_response(buf: &[u8]) -> Result<SegmentShardResponse, CodecError> {
    let (segments, consumed) = decode_seq(buf, |b| decode_blob(b))?;
    let (justifications, _consumed) = decode_seq(&buf[consumed..], |b| decode_blob(b))?;
    Ok(SegmentShardResponse { segments, justifications })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_request_round_trips() {
        let req = ShardRequest { erasure_root: [1; 32], shard_index: 5 };
        let encoded = encode_shard_request(&req);
        assert_eq!(encoded.len(), 36);
        assert_eq!(decode_shard_request(&encoded).unwrap(), req);
    }

    #[test]
    fn shard_distribution_response_round_trips() {
        let resp = ShardDistributionResponse { bundle: vec![1; 10], segments: vec![vec![2; 4], vec![3; 4]], justification: vec![4; 8] };
        let encoded = encode_shard_distribution_response(&resp);
        assert_eq!(decode_shard_distribution_response(&encoded).unwrap(), resp);
    }

    #[test]
    fn audit_shard_response_round_trips() {
        let resp = AuditShardResponse { bundle: vec![1; 5], justification: vec![2; 5] };
        let encoded = encode_audit_shard_response(&resp);
        assert_eq!(decode_audit_shard_response(&encoded).unwrap(), resp);
    }

    #[test]
    fn segment_request_and_response_round_trip() {
        let req = SegmentShardRequest {
            items: vec![SegmentShardRequestItem { erasure_root: [9; 32], shard_index: 1, segment_indices: vec![0, 1, 2] }],
        };
        let encoded = encode_segment_request(&req);
        assert_eq!(decode_segment_request(&encoded).unwrap(), req);

        let ce139_resp = SegmentShardResponse { segments: vec![vec![1; 4]], justifications: vec![] };
        assert_eq!(decode_segment_response(&encode_segment_response(&ce139_resp)).unwrap(), ce139_resp);

        let ce140_resp = SegmentShardResponse { segments: vec![vec![1; 4]], justifications: vec![vec![2; 4]] };
        assert_eq!(decode_segment_response(&encode_segment_response(&ce140_resp)).unwrap(), ce140_resp);
    }
}
