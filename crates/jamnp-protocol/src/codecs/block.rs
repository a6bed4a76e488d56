//! CE128 — Block request (spec.md §4.6, seed scenario S4).

use jamnp_core::error::CodecError;
use jamnp_core::ids::Hash;

use super::{decode_blob, decode_seq, encode_blob, encode_seq, take_fixed};

/// Which way to walk the chain from `header_hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Walk towards the head, excluding `header_hash` itself.
    AscendingExclusive = 0,
    /// Walk towards genesis, including `header_hash` itself.
    DescendingInclusive = 1,
}

impl Direction {
    fn from_byte(b: u8) -> Result<Self, CodecError> {
        match b {
            0 => Ok(Direction::AscendingExclusive),
            1 => Ok(Direction::DescendingInclusive),
            other => Err(CodecError::InvalidDiscriminator(other)),
        }
    }
}

/// `hdrHash(32) ‖ direction(1) ‖ maxBlocks(4 LE)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRequest {
    pub header_hash: Hash,
    pub direction: Direction,
    pub max_blocks: u32,
}

/// `len ‖ Block*`, each block itself a natural-length-prefixed opaque blob
/// (chain-spec encoding is outside this crate's scope).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockResponse {
    pub blocks: Vec<Vec<u8>>,
}

pub fn encode_request(req: &BlockRequest) -> Vec<u8> {
    let mut out = Vec::with_capacity(37);
    out.extend_from_slice(&req.header_hash);
    out.push(req.direction as u8);
    out.extend_from_slice(&req.max_blocks.to_le_bytes());
    out
}

pub fn decode_request(buf: &[u8]) -> Result<BlockRequest, CodecError> {
    let (header_hash, rest) = take_fixed::<32>(buf, "BlockRequest.header_hash")?;
    let (dir_byte, rest) = take_fixed::<1>(rest, "BlockRequest.direction")?;
    let (max_blocks_bytes, _rest) = take_fixed::<4>(rest, "BlockRequest.max_blocks")?;
    Ok(BlockRequest {
        header_hash,
        direction: Direction::from_byte(dir_byte[0])?,
        max_blocks: u32::from_le_bytes(max_blocks_bytes),
    })
}

pub fn encode_response(resp: &BlockResponse) -> Vec<u8> {
    encode_seq(&resp.blocks, |b| encode_blob(b))
}

pub fn decode_response(buf: &[u8]) -> Result<BlockResponse, CodecError> {
    let (blocks, _consumed) = decode_seq(buf, |b| decode_blob(b))?;
    Ok(BlockResponse { blocks })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_ce128_round_trip() {
        let req = BlockRequest { header_hash: [0xAA; 32], direction: Direction::AscendingExclusive, max_blocks: 16 };
        let encoded = encode_request(&req);
        assert_eq!(encoded.len(), 37);
        assert_eq!(&encoded[..32], &[0xAAu8; 32][..]);
        assert_eq!(encoded[32], 0);
        assert_eq!(&encoded[33..], &[0x10, 0, 0, 0]);

        let decoded = decode_request(&encoded).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn response_round_trips_with_varying_block_sizes() {
        let resp = BlockResponse { blocks: vec![vec![1, 2, 3], vec![], vec![9; 300]] };
        let encoded = encode_response(&resp);
        let decoded = decode_response(&encoded).unwrap();
        assert_eq!(decoded, resp);
    }

    #[test]
    fn invalid_direction_byte_errors() {
        let mut encoded = encode_request(&BlockRequest { header_hash: [0; 32], direction: Direction::AscendingExclusive, max_blocks: 1 });
        encoded[32] = 7;
        assert!(decode_request(&encoded).is_err());
    }
}
