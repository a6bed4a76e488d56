//! CE141 — Assurance distribution.

use jamnp_core::error::CodecError;
use jamnp_core::ids::{Ed25519Signature, Hash};

use super::take_fixed;

/// `anchor(32) ‖ bitfield(⌈C/8⌉) ‖ sig(64)`.
///
/// The bitfield's length is not self-describing on the wire — it is the
/// number of cores `C` configured for the chain, rounded up to a byte — so
/// decoding recovers it as "whatever's left between the fixed anchor and
/// the fixed trailing signature" rather than from a config lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssuranceDistribution {
    pub anchor: Hash,
    pub bitfield: Vec<u8>,
    pub signature: Ed25519Signature,
}

pub fn encode(msg: &AssuranceDistribution) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 + msg.bitfield.len() + 64);
    out.extend_from_slice(&msg.anchor);
    out.extend_from_slice(&msg.bitfield);
    out.extend_from_slice(&msg.signature);
    out
}

pub fn decode(buf: &[u8]) -> Result<AssuranceDistribution, CodecError> {
    if buf.len() < 32 + 64 {
        return Err(CodecError::insufficient(32 + 64, buf.len()));
    }
    let (anchor, rest) = take_fixed::<32>(buf, "AssuranceDistribution.anchor")?;
    let bitfield_len = rest.len() - 64;
    let bitfield = rest[..bitfield_len].to_vec();
    let (signature, _rest) = take_fixed::<64>(&rest[bitfield_len..], "AssuranceDistribution.signature")?;
    Ok(AssuranceDistribution { anchor, bitfield, signature })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_arbitrary_bitfield_length() {
        for num_cores in [1usize, 8, 9, 341] {
            let bitfield_len = num_cores.div_ceil(8);
            let msg = AssuranceDistribution { anchor: [3; 32], bitfield: vec![0xAB; bitfield_len], signature: [9; 64] };
            let encoded = encode(&msg);
            assert_eq!(decode(&encoded).unwrap(), msg);
        }
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(decode(&[0u8; 50]).is_err());
    }
}
