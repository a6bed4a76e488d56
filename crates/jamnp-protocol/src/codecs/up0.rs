//! UP0 — Block announcement, the one persistent stream (spec.md §4.7, seed
//! scenario S6).
//!
//! After the stream-kind byte a single `Handshake` is exchanged, then both
//! sides emit `Announcement` frames as they learn of new heads. A receiver
//! tells the two framings apart by attempting a `Handshake` decode first and
//! falling back to `Announcement` on failure or leftover bytes.

use jamnp_core::error::CodecError;
use jamnp_core::ids::{Hash, Slot};

use super::{decode_blob, decode_seq, encode_blob, encode_seq, take_fixed};

/// `hash(32) ‖ slot(4 LE)` — a finalised or leaf block pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Final {
    pub hash: Hash,
    pub slot: Slot,
}

fn encode_final(f: &Final) -> Vec<u8> {
    let mut out = Vec::with_capacity(36);
    out.extend_from_slice(&f.hash);
    out.extend_from_slice(&f.slot.to_le_bytes());
    out
}

fn decode_final(buf: &[u8]) -> Result<(Final, usize), CodecError> {
    let (hash, rest) = take_fixed::<32>(buf, "Final.hash")?;
    let (slot_bytes, _rest) = take_fixed::<4>(rest, "Final.slot")?;
    Ok((Final { hash, slot: u32::from_le_bytes(slot_bytes) }, 36))
}

/// `Final ‖ len‖[Leaf]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub finalized: Final,
    pub leaves: Vec<Final>,
}

/// `Header ‖ Final`. `Header` is the opaque chain-spec-encoded block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub header: Vec<u8>,
    pub finalized: Final,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Up0Message {
    Handshake(Handshake),
    Announcement(Announcement),
}

pub fn encode_handshake(msg: &Handshake) -> Vec<u8> {
    let mut out = encode_final(&msg.finalized);
    out.extend(encode_seq(&msg.leaves, encode_final));
    out
}

pub fn decode_handshake(buf: &[u8]) -> Result<Handshake, CodecError> {
    let (finalized, consumed) = decode_final(buf)?;
    let (leaves, seq_consumed) = decode_seq(&buf[consumed..], decode_final)?;
    if consumed + seq_consumed != buf.len() {
        return Err(CodecError::insufficient(buf.len(), consumed + seq_consumed));
    }
    Ok(Handshake { finalized, leaves })
}

pub fn encode_announcement(msg: &Announcement) -> Vec<u8> {
    let mut out = encode_blob(&msg.header);
    out.extend(encode_final(&msg.finalized));
    out
}

pub fn decode_announcement(buf: &[u8]) -> Result<Announcement, CodecError> {
    let (header, consumed) = decode_blob(buf)?;
    let (finalized, _consumed) = decode_final(&buf[consumed..])?;
    Ok(Announcement { header, finalized })
}

/// Try `Handshake` first; fall back to `Announcement` only if the handshake
/// decode fails to consume the whole frame (spec.md §4.7).
pub fn decode_message(buf: &[u8]) -> Result<Up0Message, CodecError> {
    match decode_handshake(buf) {
        Ok(handshake) => Ok(Up0Message::Handshake(handshake)),
        Err(_) => decode_announcement(buf).map(Up0Message::Announcement),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_round_trips() {
        let msg = Handshake {
            finalized: Final { hash: [0; 32], slot: 42 },
            leaves: vec![Final { hash: [0x11; 32], slot: 43 }],
        };
        let encoded = encode_handshake(&msg);
        assert_eq!(decode_handshake(&encoded).unwrap(), msg);
        assert_eq!(decode_message(&encoded).unwrap(), Up0Message::Handshake(msg));
    }

    #[test]
    fn announcement_round_trips_and_is_distinguished_from_handshake() {
        let msg = Announcement { header: vec![0xAB; 64], finalized: Final { hash: [0x22; 32], slot: 100 } };
        let encoded = encode_announcement(&msg);
        assert_eq!(decode_announcement(&encoded).unwrap(), msg);
        assert_eq!(decode_message(&encoded).unwrap(), Up0Message::Announcement(msg));
    }

    #[test]
    fn seed_scenario_s6_handshake() {
        let mut buf = vec![0u8; 32];
        buf.extend_from_slice(&42u32.to_le_bytes());
        buf.push(1); // one leaf, natural-encoded
        buf.extend_from_slice(&[0x11; 32]);
        buf.extend_from_slice(&43u32.to_le_bytes());

        let handshake = decode_handshake(&buf).unwrap();
        assert_eq!(handshake.finalized, Final { hash: [0; 32], slot: 42 });
        assert_eq!(handshake.leaves, vec![Final { hash: [0x11; 32], slot: 43 }]);
    }
}
