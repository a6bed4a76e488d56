//! Protocol-level errors (spec §7 "Protocol" and "Codec" error kinds).

use jamnp_core::error::CodecError;
use thiserror::Error;

/// Errors a handler can raise while decoding a payload or running its
/// domain-specific checks. Codec and protocol errors both close the one
/// stream that raised them; the connection is unaffected (§7 propagation
/// policy).
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("no handler registered for stream kind {0:#04x}")]
    UnknownStreamKind(u8),

    #[error("duplicate handler registration for stream kind {0:#04x}")]
    DuplicateStreamKind(u8),

    #[error("peer is not the intended proxy for this ticket")]
    NotIntendedProxy,

    #[error("ticket proof failed verification")]
    InvalidTicket,

    #[error("attempt byte {0} is not less than max_tickets_per_extrinsic")]
    InvalidAttemptByte(u8),

    #[error("insufficient data decoding {context}")]
    InsufficientData { context: &'static str },

    #[error("natural-encoded length {len} exceeds bound {bound}")]
    LengthExceedsBound { len: usize, bound: usize },

    #[error("external service error: {0}")]
    Service(String),
}
