//! Node configuration (SPEC_FULL.md §3 "Configuration surface"): a
//! `NodeConfig` loaded defaults-first, then overlaid with a TOML file, then
//! with environment variables — the same three-stage precedence the
//! teacher's `FederationPolicy` uses (`Default` impl, `serde` for the file
//! layer, `std::env::var` for the final override).

use std::net::SocketAddr;
use std::path::Path;

use jamnp_core::ids::{Ed25519PublicKey, Hash};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// This node's chain role, folded into the ALPN identifier (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Validator,
    Builder,
}

impl Role {
    pub fn is_builder(self) -> bool {
        matches!(self, Role::Builder)
    }
}

/// Transport-level knobs (spec.md §6 "CLI / env" `TransportConfig`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSettings {
    pub listen_addr: String,
    pub listen_port: u16,
    pub max_connections: u32,
    pub connection_timeout_ms: u64,
    pub message_timeout_ms: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 30333,
            max_connections: 1024,
            connection_timeout_ms: 10_000,
            message_timeout_ms: 30_000,
        }
    }
}

/// Static consensus parameters a node is launched with (spec.md §6 "Services
/// consumed" config parameters that are plain static config, not runtime
/// collaborators).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSettings {
    pub genesis_header_hash: String,
    pub num_cores: u16,
    pub slots_per_epoch: u32,
    pub max_tickets_per_extrinsic: u8,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            genesis_header_hash: "0".repeat(64),
            num_cores: 2,
            slots_per_epoch: 600,
            max_tickets_per_extrinsic: 2,
        }
    }
}

/// Full node configuration, assembled defaults -> TOML file -> environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Hex-encoded Ed25519 signing key seed (32 bytes). Generated fresh if absent.
    pub signing_key_hex: Option<String>,
    pub role: Role,
    pub transport: TransportSettings,
    pub chain: ChainSettings,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            signing_key_hex: None,
            role: Role::Validator,
            transport: TransportSettings::default(),
            chain: ChainSettings::default(),
        }
    }
}

impl NodeConfig {
    /// Load defaults, overlay a TOML file if `path` is given and exists,
    /// then overlay process environment variables prefixed `JAMNP_`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = path {
            let text = std::fs::read_to_string(path)
                .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
            config = toml::from_str(&text)
                .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })?;
        }

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("JAMNP_LISTEN_ADDR") {
            self.transport.listen_addr = v;
        }
        if let Ok(v) = std::env::var("JAMNP_LISTEN_PORT") {
            if let Ok(port) = v.parse() {
                self.transport.listen_port = port;
            }
        }
        if let Ok(v) = std::env::var("JAMNP_SIGNING_KEY") {
            self.signing_key_hex = Some(v);
        }
        if let Ok(v) = std::env::var("JAMNP_GENESIS_HASH") {
            self.chain.genesis_header_hash = v;
        }
        if let Ok(v) = std::env::var("JAMNP_SLOTS_PER_EPOCH") {
            if let Ok(n) = v.parse() {
                self.chain.slots_per_epoch = n;
            }
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.transport.listen_addr, self.transport.listen_port)
            .parse()
            .map_err(|e| ConfigError::InvalidGenesisHash(format!("bad listen address: {e}")))
    }

    pub fn genesis_hash(&self) -> Result<Hash, ConfigError> {
        let bytes = hex::decode(&self.chain.genesis_header_hash)
            .map_err(|e| ConfigError::InvalidGenesisHash(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(ConfigError::InvalidGenesisHash(format!("expected 32 bytes, got {}", bytes.len())));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(hash)
    }

    /// Parse the configured signing key, or generate a fresh one if absent.
    pub fn signing_key(&self) -> Result<ed25519_dalek::SigningKey, ConfigError> {
        match &self.signing_key_hex {
            Some(hex_key) => {
                let bytes = hex::decode(hex_key).map_err(|e| ConfigError::InvalidSigningKey(e.to_string()))?;
                let seed: [u8; 32] =
                    bytes.try_into().map_err(|_| ConfigError::InvalidSigningKey("expected 32-byte seed".to_string()))?;
                Ok(ed25519_dalek::SigningKey::from_bytes(&seed))
            }
            None => {
                use rand::rngs::OsRng;
                Ok(ed25519_dalek::SigningKey::generate(&mut OsRng))
            }
        }
    }
}

/// Helper for log lines and certificate-key comparisons.
pub fn public_key_hex(key: &Ed25519PublicKey) -> String {
    hex::encode(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_bind_addr() {
        let config = NodeConfig::default();
        assert_eq!(config.bind_addr().unwrap(), "0.0.0.0:30333".parse().unwrap());
    }

    #[test]
    fn genesis_hash_round_trips_hex() {
        let mut config = NodeConfig::default();
        config.chain.genesis_header_hash = hex::encode([0xABu8; 32]);
        assert_eq!(config.genesis_hash().unwrap(), [0xAB; 32]);
    }

    #[test]
    fn rejects_wrong_length_genesis_hash() {
        let mut config = NodeConfig::default();
        config.chain.genesis_header_hash = "ab".to_string();
        assert!(config.genesis_hash().is_err());
    }

    #[test]
    fn toml_file_overlays_defaults() {
        let toml_src = r#"
            role = "builder"

            [transport]
            listen_addr = "127.0.0.1"
            listen_port = 9000
            max_connections = 10
            connection_timeout_ms = 1000
            message_timeout_ms = 1000

            [chain]
            genesis_header_hash = "ab00000000000000000000000000000000000000000000000000000000000000"
            num_cores = 4
            slots_per_epoch = 60
            max_tickets_per_extrinsic = 3
        "#;
        let config: NodeConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.role, Role::Builder);
        assert_eq!(config.transport.listen_port, 9000);
    }

    #[test]
    fn missing_signing_key_generates_fresh_one() {
        let config = NodeConfig::default();
        let key = config.signing_key().unwrap();
        assert_eq!(key.verifying_key().to_bytes().len(), 32);
    }
}
