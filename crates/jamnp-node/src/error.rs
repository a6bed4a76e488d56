//! Top-level error taxonomy for wiring and configuration (spec.md §7,
//! SPEC_FULL.md §3 "Error taxonomy").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },

    #[error("invalid signing key: {0}")]
    InvalidSigningKey(String),

    #[error("invalid genesis header hash: {0}")]
    InvalidGenesisHash(String),
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] jamnp_transport::error::TransportError),

    #[error(transparent)]
    Connection(#[from] jamnp_transport::error::ConnectionError),
}
