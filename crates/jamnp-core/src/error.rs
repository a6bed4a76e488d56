//! Codec-level errors shared by every wire-format module in this crate.

use thiserror::Error;

/// Errors raised while encoding or decoding JAMNP-S wire primitives.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("insufficient bytes: need at least {need}, have {have}")]
    InsufficientData { need: usize, have: usize },

    #[error("insufficient bytes for {context}: need at least {need}, have {have}")]
    InsufficientDataFor { context: &'static str, need: usize, have: usize },

    #[error("invalid discriminator byte: {0:#04x}")]
    InvalidDiscriminator(u8),

    #[error("length field {len} exceeds bound {bound}")]
    LengthExceedsBound { len: usize, bound: usize },

    #[error("invalid AltName string: {0}")]
    InvalidAltName(String),
}

impl CodecError {
    pub fn insufficient(need: usize, have: usize) -> Self {
        Self::InsufficientData { need, have }
    }

    pub fn insufficient_for(context: &'static str, need: usize, have: usize) -> Self {
        Self::InsufficientDataFor { context, need, have }
    }
}
