//! Transport and connection error taxonomy (spec §7 "Transport" error kinds).

use thiserror::Error;

/// Errors that can occur before or while establishing a QUIC endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind QUIC endpoint on {addr}: {source}")]
    Bind { addr: std::net::SocketAddr, #[source] source: std::io::Error },

    #[error("TLS configuration failed: {0}")]
    Tls(String),

    #[error("certificate generation failed: {0}")]
    CertGeneration(String),

    #[error("endpoint is not started")]
    NotStarted,

    #[error("endpoint is shutting down")]
    ShuttingDown,
}

/// Errors that can occur over the lifetime of an established connection or stream.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("ALPN mismatch: offered {offered:?}, expected prefix {expected}")]
    AlpnMismatch { offered: Option<String>, expected: String },

    #[error("certificate SAN could not be parsed as an AltName: {0}")]
    CertSubjectMismatch(String),

    #[error("connect to {addr} failed: {source}")]
    ConnectFailed { addr: std::net::SocketAddr, #[source] source: quinn::ConnectionError },

    #[error("connection timed out")]
    Timeout,

    #[error("connection closed: {0}")]
    Closed(String),

    #[error("stream reset (error code {0})")]
    StreamReset(u32),

    #[error("stream i/o error: {0}")]
    StreamIo(String),
}
