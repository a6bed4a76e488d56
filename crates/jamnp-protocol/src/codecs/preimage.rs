//! CE142 — Preimage announcement, CE143 — Preimage request.

use jamnp_core::error::CodecError;
use jamnp_core::ids::Hash;

use super::take_fixed;

/// `serviceId(4 LE) ‖ hash(32) ‖ len(4 LE)`.
///
/// Unlike most `len` fields in §4.6 this one is a plain fixed-width `u32`
/// byte count (the announced preimage's size), not a Gray-Paper natural
/// prefix — there is no following blob to delimit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreimageAnnouncement {
    pub service_id: u32,
    pub hash: Hash,
    pub len: u32,
}

pub fn encode_announcement(msg: &PreimageAnnouncement) -> Vec<u8> {
    let mut out = Vec::with_capacity(40);
    out.extend_from_slice(&msg.service_id.to_le_bytes());
    out.extend_from_slice(&msg.hash);
    out.extend_from_slice(&msg.len.to_le_bytes());
    out
}

pub fn decode_announcement(buf: &[u8]) -> Result<PreimageAnnouncement, CodecError> {
    let (service_bytes, rest) = take_fixed::<4>(buf, "PreimageAnnouncement.service_id")?;
    let (hash, rest) = take_fixed::<32>(rest, "PreimageAnnouncement.hash")?;
    let (len_bytes, _rest) = take_fixed::<4>(rest, "PreimageAnnouncement.len")?;
    Ok(PreimageAnnouncement { service_id: u32::from_le_bytes(service_bytes), hash, len: u32::from_le_bytes(len_bytes) })
}

/// `hash(32)` — CE143's request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreimageRequest {
    pub hash: Hash,
}

pub fn encode_request(req: &PreimageRequest) -> Vec<u8> {
    req.hash.to_vec()
}

pub fn decode_request(buf: &[u8]) -> Result<PreimageRequest, CodecError> {
    let (hash, _rest) = take_fixed::<32>(buf, "PreimageRequest.hash")?;
    Ok(PreimageRequest { hash })
}

/// The response to CE143 is the opaque preimage bytes, the whole frame.
pub fn encode_response(preimage: &[u8]) -> Vec<u8> {
    preimage.to_vec()
}

pub fn decode_response(buf: &[u8]) -> Vec<u8> {
    buf.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcement_round_trips() {
        let msg = PreimageAnnouncement { service_id: 99, hash: [4; 32], len: 1024 };
        let encoded = encode_announcement(&msg);
        assert_eq!(encoded.len(), 40);
        assert_eq!(decode_announcement(&encoded).unwrap(), msg);
    }

    #[test]
    fn request_and_response_round_trip() {
        let req = PreimageRequest { hash: [8; 32] };
        let encoded = encode_request(&req);
        assert_eq!(encoded.len(), 32);
        assert_eq!(decode_request(&encoded).unwrap(), req);

        let preimage = vec![0x77u8; 256];
        assert_eq!(decode_response(&encode_response(&preimage)), preimage);
    }
}
