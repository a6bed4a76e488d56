//! rustls `ServerConfig`/`ClientConfig` assembly: mutual TLS plus ALPN.

use std::sync::Arc;
use std::time::Duration;

use jamnp_core::AlpnId;
use jamnp_core::ids::Ed25519PublicKey;
use quinn::{ClientConfig, ServerConfig};

use crate::cert::{JamCertificate, PeerSetClientVerifier, PeerSetServerVerifier};
use crate::error::TransportError;

/// Build the server-side QUIC config: requires and verifies the peer's
/// client certificate, advertises `alpn` for negotiation.
pub fn configure_server(
    cert: &JamCertificate,
    alpn: &AlpnId,
    allowed: impl Fn(&Ed25519PublicKey) -> bool + Send + Sync + 'static,
) -> Result<ServerConfig, TransportError> {
    let mut server_crypto = rustls::ServerConfig::builder()
        .with_client_cert_verifier(PeerSetClientVerifier::new(allowed))
        .with_single_cert(vec![cert.cert.clone()], cert.key.clone_key())
        .map_err(|e| TransportError::Tls(e.to_string()))?;

    server_crypto.alpn_protocols = vec![alpn.to_string().into_bytes()];

    let mut server_config = ServerConfig::with_crypto(Arc::new(
        quinn::crypto::rustls::QuicServerConfig::try_from(server_crypto)
            .map_err(|e| TransportError::Tls(e.to_string()))?,
    ));

    let transport_config = Arc::get_mut(&mut server_config.transport).expect("fresh server config");
    transport_config.max_idle_timeout(Some(Duration::from_secs(60).try_into().expect("fits")));
    transport_config.keep_alive_interval(Some(Duration::from_secs(30)));

    Ok(server_config)
}

/// Build the client-side QUIC config for dialling a single peer whose key we
/// already know: presents our own cert for mutual auth, verifies the peer's
/// cert against `allowed` (normally just `|k| k == expected_peer_key`).
pub fn configure_client(
    cert: &JamCertificate,
    alpn: &AlpnId,
    allowed: impl Fn(&Ed25519PublicKey) -> bool + Send + Sync + 'static,
) -> Result<ClientConfig, TransportError> {
    let mut client_crypto = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(PeerSetServerVerifier::new(allowed))
        .with_client_auth_cert(vec![cert.cert.clone()], cert.key.clone_key())
        .map_err(|e| TransportError::Tls(e.to_string()))?;

    client_crypto.alpn_protocols = vec![alpn.to_string().into_bytes()];

    let client_config = ClientConfig::new(Arc::new(
        quinn::crypto::rustls::QuicClientConfig::try_from(client_crypto)
            .map_err(|e| TransportError::Tls(e.to_string()))?,
    ));

    Ok(client_config)
}
