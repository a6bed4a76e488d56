//! CE131 / CE132 — Safrole ticket distribution (spec.md §4.8, seed scenario S5).
//!
//! Both stream kinds carry the identical payload; they differ only in who
//! dials whom (generator → proxy for CE131, proxy → every current validator
//! for CE132). The response is empty on success; failure closes the stream.

use jamnp_core::error::CodecError;
use jamnp_core::ids::EpochIndex;

use super::take_fixed;

pub const PROOF_LEN: usize = 784;

/// `epoch(4 LE) ‖ attempt(1) ‖ proof(784)`.
#[derive(Clone)]
pub struct TicketDistribution {
    pub epoch: EpochIndex,
    pub attempt: u8,
    pub proof: Box<[u8; PROOF_LEN]>,
}

impl std::fmt::Debug for TicketDistribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketDistribution")
            .field("epoch", &self.epoch)
            .field("attempt", &self.attempt)
            .field("proof_len", &self.proof.len())
            .finish()
    }
}

impl PartialEq for TicketDistribution {
    fn eq(&self, other: &Self) -> bool {
        self.epoch == other.epoch && self.attempt == other.attempt && self.proof[..] == other.proof[..]
    }
}
impl Eq for TicketDistribution {}

pub fn encode(msg: &TicketDistribution) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 1 + PROOF_LEN);
    out.extend_from_slice(&msg.epoch.to_le_bytes());
    out.push(msg.attempt);
    out.extend_from_slice(msg.proof.as_slice());
    out
}

pub fn decode(buf: &[u8]) -> Result<TicketDistribution, CodecError> {
    let (epoch_bytes, rest) = take_fixed::<4>(buf, "TicketDistribution.epoch")?;
    let (attempt_bytes, rest) = take_fixed::<1>(rest, "TicketDistribution.attempt")?;
    let (proof, _rest) = take_fixed::<PROOF_LEN>(rest, "TicketDistribution.proof")?;
    Ok(TicketDistribution { epoch: u32::from_le_bytes(epoch_bytes), attempt: attempt_bytes[0], proof: Box::new(proof) })
}

/// `attempt` must be strictly less than the configured
/// `max_tickets_per_extrinsic` (§7 "invalid attempt byte").
pub fn is_valid_attempt(attempt: u8, max_tickets_per_extrinsic: u8) -> bool {
    attempt < max_tickets_per_extrinsic
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let msg = TicketDistribution { epoch: 7, attempt: 0, proof: Box::new([0x42; PROOF_LEN]) };
        let encoded = encode(&msg);
        assert_eq!(encoded.len(), 4 + 1 + PROOF_LEN);
        assert_eq!(decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn attempt_byte_bound() {
        assert!(is_valid_attempt(0, 4));
        assert!(is_valid_attempt(3, 4));
        assert!(!is_valid_attempt(4, 4));
    }
}
