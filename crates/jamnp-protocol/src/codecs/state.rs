//! CE129 — State request.

use jamnp_core::error::CodecError;
use jamnp_core::ids::Hash;

use super::{decode_blob, decode_seq, encode_blob, encode_seq, take_fixed};

/// `hdrHash(32) ‖ startKey(32) ‖ endKey(32) ‖ maxSize(4 LE)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRequest {
    pub header_hash: Hash,
    pub start_key: Hash,
    pub end_key: Hash,
    pub max_size: u32,
}

/// One key/value pair out of the state trie, each side independently
/// natural-length-prefixed (`klen ‖ key ‖ vlen ‖ val`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// `len ‖ Node* ‖ len ‖ (klen‖key‖vlen‖val)*`: trie nodes proving the
/// boundary of the range, then the entries themselves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StateResponse {
    pub nodes: Vec<Vec<u8>>,
    pub entries: Vec<StateEntry>,
}

pub fn encode_request(req: &StateRequest) -> Vec<u8> {
    let mut out = Vec::with_capacity(100);
    out.extend_from_slice(&req.header_hash);
    out.extend_from_slice(&req.start_key);
    out.extend_from_slice(&req.end_key);
    out.extend_from_slice(&req.max_size.to_le_bytes());
    out
}

pub fn decode_request(buf: &[u8]) -> Result<StateRequest, CodecError> {
    let (header_hash, rest) = take_fixed::<32>(buf, "StateRequest.header_hash")?;
    let (start_key, rest) = take_fixed::<32>(rest, "StateRequest.start_key")?;
    let (end_key, rest) = take_fixed::<32>(rest, "StateRequest.end_key")?;
    let (max_size_bytes, _rest) = take_fixed::<4>(rest, "StateRequest.max_size")?;
    Ok(StateRequest { header_hash, start_key, end_key, max_size: u32::from_le_bytes(max_size_bytes) })
}

fn encode_entry(entry: &StateEntry) -> Vec<u8> {
    let mut out = encode_blob(&entry.key);
    out.extend(encode_blob(&entry.value));
    out
}

fn decode_entry(buf: &[u8]) -> Result<(StateEntry, usize), CodecError> {
    let (key, key_consumed) = decode_blob(buf)?;
    let (value, value_consumed) = decode_blob(&buf[key_consumed..])?;
    Ok((StateEntry { key, value }, key_consumed + value_consumed))
}

pub fn encode_response(resp: &StateResponse) -> Vec<u8> {
    let mut out = encode_seq(&resp.nodes, |n| encode_blob(n));
    out.extend(encode_seq(&resp.entries, |e| encode_entry(e)));
    out
}

pub fn decode_response(buf: &[u8]) -> Result<StateResponse, CodecError> {
    let (nodes, consumed) = decode_seq(buf, |b| decode_blob(b))?;
    let (entries, _consumed) = decode_seq(&buf[consumed..], decode_entry)?;
    Ok(StateResponse { nodes, entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips() {
        let req = StateRequest { header_hash: [1; 32], start_key: [2; 32], end_key: [3; 32], max_size: 4096 };
        let encoded = encode_request(&req);
        assert_eq!(encoded.len(), 100);
        assert_eq!(decode_request(&encoded).unwrap(), req);
    }

    #[test]
    fn response_round_trips_with_nodes_and_entries() {
        let resp = StateResponse {
            nodes: vec![vec![1, 2], vec![3]],
            entries: vec![
                StateEntry { key: b"k1".to_vec(), value: b"v1".to_vec() },
                StateEntry { key: vec![], value: vec![0; 64] },
            ],
        };
        let encoded = encode_response(&resp);
        assert_eq!(decode_response(&encoded).unwrap(), resp);
    }
}
