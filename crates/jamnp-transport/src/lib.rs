//! QUIC transport for JAMNP-S: mutual-TLS endpoints, ALPN negotiation, and
//! stream-kind framed connections.
//!
//! # Modules
//!
//! - [`cert`]: self-signed certificate generation and peer-set verification
//! - [`tls`]: rustls `ServerConfig`/`ClientConfig` assembly
//! - [`connection`]: an established connection and its streams
//! - [`endpoint`]: the QUIC endpoint that mints connections
//! - [`error`]: transport and connection error taxonomy

#![warn(clippy::all)]

pub mod cert;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod tls;

pub use connection::{Connection, Stream};
pub use endpoint::QuicTransport;
pub use error::{ConnectionError, TransportError};
