//! Stream-kind byte and the `len(u32 LE) ‖ bytes` frame format used by every
//! stream once its kind byte has been written.

use crate::error::CodecError;

/// First byte written to a freshly opened stream: which sub-protocol owns it.
///
/// UP (Unique Persistent) streams use kinds 0-127; CE (Common Ephemeral)
/// streams use kinds 128-255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Up(u8),
    Ce(u8),
}

impl StreamKind {
    pub const UP_BLOCK_ANNOUNCEMENT: StreamKind = StreamKind::Up(0);

    pub const CE_BLOCK_REQUEST: StreamKind = StreamKind::Ce(128);
    pub const CE_STATE_REQUEST: StreamKind = StreamKind::Ce(129);
    pub const CE_SAFROLE_TICKET_DIST_1: StreamKind = StreamKind::Ce(131);
    pub const CE_SAFROLE_TICKET_DIST_2: StreamKind = StreamKind::Ce(132);
    pub const CE_WORK_PACKAGE_SUBMIT: StreamKind = StreamKind::Ce(133);
    pub const CE_WORK_PACKAGE_SHARE: StreamKind = StreamKind::Ce(134);
    pub const CE_WORK_REPORT_DIST: StreamKind = StreamKind::Ce(135);
    pub const CE_WORK_REPORT_REQUEST: StreamKind = StreamKind::Ce(136);
    pub const CE_SHARD_DIST: StreamKind = StreamKind::Ce(137);
    pub const CE_AUDIT_SHARD_REQUEST: StreamKind = StreamKind::Ce(138);
    pub const CE_SEGMENT_SHARD_REQUEST: StreamKind = StreamKind::Ce(139);
    pub const CE_SEGMENT_SHARD_REQUEST_2: StreamKind = StreamKind::Ce(140);
    pub const CE_ASSURANCE_DIST: StreamKind = StreamKind::Ce(141);
    pub const CE_PREIMAGE_ANNOUNCEMENT: StreamKind = StreamKind::Ce(142);
    pub const CE_PREIMAGE_REQUEST: StreamKind = StreamKind::Ce(143);
    pub const CE_AUDIT_ANNOUNCEMENT: StreamKind = StreamKind::Ce(144);
    pub const CE_JUDGMENT_PUBLICATION: StreamKind = StreamKind::Ce(145);

    pub fn to_byte(self) -> u8 {
        match self {
            StreamKind::Up(n) => n,
            StreamKind::Ce(n) => n,
        }
    }

    pub fn from_byte(b: u8) -> Self {
        if b < 128 {
            StreamKind::Up(b)
        } else {
            StreamKind::Ce(b)
        }
    }

    pub fn is_persistent(self) -> bool {
        matches!(self, StreamKind::Up(_))
    }
}

/// A single `len ‖ bytes` frame on a stream.
pub struct Frame;

impl Frame {
    /// Encode `content` as a 4-byte little-endian length prefix followed by the bytes.
    pub fn encode(content: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + content.len());
        buf.extend_from_slice(&(content.len() as u32).to_le_bytes());
        buf.extend_from_slice(content);
        buf
    }

    /// Decode one frame from the front of `buf`, returning the payload and the
    /// number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Vec<u8>, usize), CodecError> {
        if buf.len() < 4 {
            return Err(CodecError::insufficient(4, buf.len()));
        }
        let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if buf.len() < 4 + len {
            return Err(CodecError::insufficient(4 + len, buf.len()));
        }
        Ok((buf[4..4 + len].to_vec(), 4 + len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_kind_roundtrips_through_byte() {
        assert_eq!(StreamKind::UP_BLOCK_ANNOUNCEMENT.to_byte(), 0);
        assert_eq!(StreamKind::CE_BLOCK_REQUEST.to_byte(), 128);
        assert_eq!(StreamKind::from_byte(128), StreamKind::CE_BLOCK_REQUEST);
        assert_eq!(StreamKind::from_byte(0), StreamKind::UP_BLOCK_ANNOUNCEMENT);
        assert!(StreamKind::UP_BLOCK_ANNOUNCEMENT.is_persistent());
        assert!(!StreamKind::CE_BLOCK_REQUEST.is_persistent());
    }

    #[test]
    fn frame_roundtrip() {
        let content = b"hello validator";
        let encoded = Frame::encode(content);
        assert_eq!(encoded.len(), 4 + content.len());

        let (decoded, consumed) = Frame::decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, content);
    }

    #[test]
    fn invariant_4_frame_boundaries_concatenated() {
        let frames: Vec<&[u8]> = vec![b"a", b"bb", b"ccc", b""];
        let mut stream = Vec::new();
        for f in &frames {
            stream.extend_from_slice(&Frame::encode(f));
        }

        let mut expected = Vec::new();
        for f in &frames {
            expected.extend_from_slice(&(f.len() as u32).to_le_bytes());
            expected.extend_from_slice(f);
        }
        assert_eq!(stream, expected);

        let mut offset = 0;
        for f in &frames {
            let (payload, consumed) = Frame::decode(&stream[offset..]).unwrap();
            assert_eq!(payload, *f);
            offset += consumed;
        }
        assert_eq!(offset, stream.len());
    }

    #[test]
    fn decode_reports_insufficient_data() {
        assert!(Frame::decode(&[1, 2, 3]).is_err());
        let short = Frame::encode(b"hello");
        assert!(Frame::decode(&short[..short.len() - 1]).is_err());
    }
}
