//! CE145 — Judgment publication.

use jamnp_core::error::CodecError;
use jamnp_core::ids::{EpochIndex, Hash};
use jamnp_core::natural;

use super::take_fixed;

/// Judgments are signed with a 32-byte signature, distinct from the 64-byte
/// `Ed25519Signature` used elsewhere in §4.6.
pub type JudgmentSignature = [u8; 32];

/// `epoch(4) ‖ validator(4) ‖ validity(var) ‖ wrHash(32) ‖ sig(32)`.
///
/// `validator` is carried as a full 4-byte field here rather than the 2-byte
/// `valIdx` used by CE135's guarantor signatures; widened locally rather than
/// through `jamnp_core::ids::ValidatorIndex` to keep that type's width
/// faithful to the rest of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JudgmentPublication {
    pub epoch: EpochIndex,
    pub validator: u32,
    pub validity: bool,
    pub work_report_hash: Hash,
    pub signature: JudgmentSignature,
}

pub fn encode(msg: &JudgmentPublication) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&msg.epoch.to_le_bytes());
    out.extend_from_slice(&msg.validator.to_le_bytes());
    out.extend(natural::encode(msg.validity as u64));
    out.extend_from_slice(&msg.work_report_hash);
    out.extend_from_slice(&msg.signature);
    out
}

pub fn decode(buf: &[u8]) -> Result<JudgmentPublication, CodecError> {
    let (epoch_bytes, rest) = take_fixed::<4>(buf, "JudgmentPublication.epoch")?;
    let (validator_bytes, rest) = take_fixed::<4>(rest, "JudgmentPublication.validator")?;
    let (validity_raw, offset) = natural::decode(rest)?;
    let rest = &rest[offset..];
    let (work_report_hash, rest) = take_fixed::<32>(rest, "JudgmentPublication.work_report_hash")?;
    let (signature, _rest) = take_fixed::<32>(rest, "JudgmentPublication.signature")?;
    Ok(JudgmentPublication {
        epoch: u32::from_le_bytes(epoch_bytes),
        validator: u32::from_le_bytes(validator_bytes),
        validity: validity_raw != 0,
        work_report_hash,
        signature,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_both_validity_values() {
        for validity in [true, false] {
            let msg = JudgmentPublication { epoch: 12, validator: 3, validity, work_report_hash: [6; 32], signature: [7; 32] };
            let encoded = encode(&msg);
            assert_eq!(decode(&encoded).unwrap(), msg);
        }
    }
}
