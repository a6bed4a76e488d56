//! Wire-level primitives for the JAM Simple Networking Protocol (JAMNP-S).
//!
//! This crate has no I/O of its own: it is the pure, synchronous layer that
//! every other `jamnp-*` crate builds on.
//!
//! # Modules
//!
//! - [`ids`]: identifier and metadata types shared across the stack
//! - [`altname`]: certificate AltName encoding and the ALPN identifier
//! - [`natural`]: Gray-Paper variable-length natural number codec
//! - [`framing`]: stream-kind byte and the `len ‖ bytes` frame format
//! - [`grid`]: the square validator grid topology
//! - [`initiator`]: the deterministic preferred-initiator rule
//! - [`error`]: the shared [`error::CodecError`] type

#![warn(clippy::all)]

pub mod altname;
pub mod error;
pub mod framing;
pub mod grid;
pub mod ids;
pub mod initiator;
pub mod natural;

pub use altname::AlpnId;
pub use error::CodecError;
pub use framing::{Frame, StreamKind};
pub use grid::{GridPosition, ValidatorGrid};
pub use ids::{
    BandersnatchPublicKey, CoreIndex, Ed25519PublicKey, Ed25519Signature, Endpoint, EpochIndex,
    Hash, Slot, ValidatorIndex, ValidatorMetadata,
};
pub use initiator::{preferred_initiator, should_initiate};

/// JAMNP-S protocol version advertised in the ALPN identifier.
pub const PROTOCOL_VERSION: u8 = 0;

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::altname::AlpnId;
    pub use crate::error::CodecError;
    pub use crate::framing::{Frame, StreamKind};
    pub use crate::grid::ValidatorGrid;
    pub use crate::ids::*;
    pub use crate::initiator::preferred_initiator;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_compile() {
        let _: ValidatorIndex = 0;
        let _: StreamKind = StreamKind::UP_BLOCK_ANNOUNCEMENT;
        let grid = ValidatorGrid::new(&[0, 1, 2, 3]);
        assert_eq!(grid.cols(), 2);
    }
}
