//! Identifier types shared across every JAMNP-S layer.

use serde::{Deserialize, Serialize};

/// Ed25519 public key (32 bytes).
pub type Ed25519PublicKey = [u8; 32];

/// Ed25519 signature (64 bytes).
pub type Ed25519Signature = [u8; 64];

/// Bandersnatch public key (32 bytes). Opaque to this crate; only moved around
/// as bytes, verified by the external ticket service.
pub type BandersnatchPublicKey = [u8; 32];

/// Generic 32-byte hash (header hash, work-report hash, erasure root, ...).
pub type Hash = [u8; 32];

/// Position of a validator within the active set, stable within an epoch.
pub type ValidatorIndex = u16;

/// Core index (JAM has a fixed small number of cores per epoch).
pub type CoreIndex = u16;

/// Slot number; increments once per block-production slot.
pub type Slot = u32;

/// Epoch index, `slot / slots_per_epoch`.
pub type EpochIndex = u32;

/// Endpoint a validator can be reached at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// The peer's Ed25519 public key; immutable once set.
    pub peer_key: Ed25519PublicKey,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, peer_key: Ed25519PublicKey) -> Self {
        Self { host: host.into(), port, peer_key }
    }
}

/// Metadata published for a validator in the active set, replaced wholesale at
/// epoch transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorMetadata {
    pub ed25519_key: Ed25519PublicKey,
    pub bandersnatch_key: BandersnatchPublicKey,
    pub endpoint: Option<Endpoint>,
}

impl ValidatorMetadata {
    pub fn new(
        ed25519_key: Ed25519PublicKey,
        bandersnatch_key: BandersnatchPublicKey,
        endpoint: Option<Endpoint>,
    ) -> Self {
        Self { ed25519_key, bandersnatch_key, endpoint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_equality_is_field_wise() {
        let a = Endpoint::new("10.0.0.1", 9999, [7u8; 32]);
        let b = Endpoint::new("10.0.0.1", 9999, [7u8; 32]);
        let c = Endpoint::new("10.0.0.1", 9998, [7u8; 32]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn validator_metadata_carries_optional_endpoint() {
        let meta = ValidatorMetadata::new([1u8; 32], [2u8; 32], None);
        assert!(meta.endpoint.is_none());
    }
}
