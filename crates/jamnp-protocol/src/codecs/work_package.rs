//! CE133 — Work-package submission, CE134 — Work-package sharing.
//!
//! `WorkPackage` is opaque to this crate (spec.md §1 scope: payload
//! semantics live elsewhere). Where the spec's table places one opaque
//! field directly before another with no explicit `len`, we insert an
//! explicit natural-length prefix so the two can be split deterministically
//! without parsing the opaque bytes; the final variable field of a message
//! always consumes the remainder of the frame instead (see DESIGN.md).

use jamnp_core::error::CodecError;
use jamnp_core::ids::{CoreIndex, Ed25519Signature, Hash};

use super::{decode_blob, decode_seq, encode_blob, encode_seq, take_fixed};

/// `coreIdx(4 LE) ‖ len‖WorkPackage ‖ extrinsicBytes` (remainder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkPackageSubmission {
    pub core_index: CoreIndex,
    pub work_package: Vec<u8>,
    pub extrinsic: Vec<u8>,
}

pub fn encode_submission(msg: &WorkPackageSubmission) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(msg.core_index as u32).to_le_bytes());
    out.extend(encode_blob(&msg.work_package));
    out.extend_from_slice(&msg.extrinsic);
    out
}

pub fn decode_submission(buf: &[u8]) -> Result<WorkPackageSubmission, CodecError> {
    let (core_bytes, rest) = take_fixed::<4>(buf, "WorkPackageSubmission.core_index")?;
    let (work_package, consumed) = decode_blob(rest)?;
    let extrinsic = rest[consumed..].to_vec();
    Ok(WorkPackageSubmission {
        core_index: u32::from_le_bytes(core_bytes) as CoreIndex,
        work_package,
        extrinsic,
    })
}

/// One bundle segment-root pair referenced by a [`WorkPackageShare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRootMapping {
    pub work_package_hash: Hash,
    pub segment_root: Hash,
}

/// `coreIdx(4 LE) ‖ len‖(wpHash‖segRoot)* ‖ WorkPackage` (remainder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkPackageShare {
    pub core_index: CoreIndex,
    pub segment_roots: Vec<SegmentRootMapping>,
    pub work_package: Vec<u8>,
}

/// `wrHash(32) ‖ sig(64)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkPackageShareResponse {
    pub work_report_hash: Hash,
    pub signature: Ed25519Signature,
}

fn encode_mapping(m: &SegmentRootMapping) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&m.work_package_hash);
    out.extend_from_slice(&m.segment_root);
    out
}

fn decode_mapping(buf: &[u8]) -> Result<(SegmentRootMapping, usize), CodecError> {
    let (work_package_hash, rest) = take_fixed::<32>(buf, "SegmentRootMapping.work_package_hash")?;
    let (segment_root, _rest) = take_fixed::<32>(rest, "SegmentRootMapping.segment_root")?;
    Ok((SegmentRootMapping { work_package_hash, segment_root }, 64))
}

pub fn encode_share(msg: &WorkPackageShare) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(msg.core_index as u32).to_le_bytes());
    out.extend(encode_seq(&msg.segment_roots, encode_mapping));
    out.extend_from_slice(&msg.work_package);
    out
}

pub fn decode_share(buf: &[u8]) -> Result<WorkPackageShare, CodecError> {
    let (core_bytes, rest) = take_fixed::<4>(buf, "WorkPackageShare.core_index")?;
    let (segment_roots, consumed) = decode_seq(rest, decode_mapping)?;
    let work_package = rest[consumed..].to_vec();
    Ok(WorkPackageShare { core_index: u32::from_le_bytes(core_bytes) as CoreIndex, segment_roots, work_package })
}

pub fn encode_share_response(resp: &WorkPackageShareResponse) -> Vec<u8> {
    let mut out = Vec::with_capacity(96);
    out.extend_from_slice(&resp.work_report_hash);
    out.extend_from_slice(&resp.signature);
    out
}

pub fn decode_share_response(buf: &[u8]) -> Result<WorkPackageShareResponse, CodecError> {
    let (work_report_hash, rest) = take_fixed::<32>(buf, "WorkPackageShareResponse.work_report_hash")?;
    let (signature, _rest) = take_fixed::<64>(rest, "WorkPackageShareResponse.signature")?;
    Ok(WorkPackageShareResponse { work_report_hash, signature })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_round_trips() {
        let msg = WorkPackageSubmission { core_index: 3, work_package: vec![1, 2, 3], extrinsic: vec![4; 50] };
        let encoded = encode_submission(&msg);
        assert_eq!(decode_submission(&encoded).unwrap(), msg);
    }

    #[test]
    fn share_and_response_round_trip() {
        let share = WorkPackageShare {
            core_index: 1,
            segment_roots: vec![SegmentRootMapping { work_package_hash: [1; 32], segment_root: [2; 32] }],
            work_package: vec![9; 128],
        };
        let encoded = encode_share(&share);
        assert_eq!(decode_share(&encoded).unwrap(), share);

        let resp = WorkPackageShareResponse { work_report_hash: [5; 32], signature: [6; 64] };
        let encoded_resp = encode_share_response(&resp);
        assert_eq!(encoded_resp.len(), 96);
        assert_eq!(decode_share_response(&encoded_resp).unwrap(), resp);
    }
}
