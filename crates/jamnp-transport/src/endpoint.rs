//! The QUIC endpoint: binds a socket, accepts inbound connections, dials
//! outbound ones, and owns graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use jamnp_core::ids::Ed25519PublicKey;
use jamnp_core::AlpnId;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::cert::{generate_self_signed, JamCertificate};
use crate::connection::Connection;
use crate::error::{ConnectionError, TransportError};
use crate::tls::{configure_client, configure_server};

/// Factory for connections to a single JAMNP-S chain, identified by `alpn`.
///
/// One `QuicTransport` per node: it owns the node's certificate and the
/// bound endpoint, and mints [`Connection`]s either by dialling or by
/// accepting.
pub struct QuicTransport {
    signing_key: ed25519_dalek::SigningKey,
    cert: JamCertificate,
    alpn: AlpnId,
    endpoint: RwLock<Option<quinn::Endpoint>>,
    bind_addr: SocketAddr,
}

impl QuicTransport {
    pub fn new(
        signing_key: ed25519_dalek::SigningKey,
        alpn: AlpnId,
        bind_addr: SocketAddr,
    ) -> Result<Self, TransportError> {
        let public = signing_key.verifying_key().to_bytes();
        let cert = generate_self_signed(&public)?;

        Ok(Self { signing_key, cert, alpn, endpoint: RwLock::new(None), bind_addr })
    }

    pub fn local_key(&self) -> Ed25519PublicKey {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Bind the UDP socket and start accepting connections whose client
    /// certificate's key satisfies `allowed`.
    pub fn start(
        &self,
        allowed: impl Fn(&Ed25519PublicKey) -> bool + Send + Sync + 'static,
    ) -> Result<(), TransportError> {
        if self.endpoint.read().is_some() {
            return Ok(());
        }

        let server_config = configure_server(&self.cert, &self.alpn, allowed)?;
        let endpoint = quinn::Endpoint::server(server_config, self.bind_addr)
            .map_err(|e| TransportError::Bind { addr: self.bind_addr, source: e })?;

        info!(addr = %self.bind_addr, alpn = %self.alpn, "QUIC endpoint bound");
        *self.endpoint.write() = Some(endpoint);
        Ok(())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.endpoint.read().as_ref().and_then(|e| e.local_addr().ok())
    }

    /// Dial `addr`, expecting the peer to present certificate key `expected_peer_key`.
    pub async fn connect(
        &self,
        addr: SocketAddr,
        expected_peer_key: Ed25519PublicKey,
    ) -> Result<Connection, ConnectionError> {
        let endpoint = {
            let guard = self.endpoint.read();
            guard.clone().ok_or(ConnectionError::Closed("transport not started".to_string()))?
        };

        let client_config = configure_client(&self.cert, &self.alpn, move |k| *k == expected_peer_key)
            .map_err(|e| ConnectionError::Closed(e.to_string()))?;

        let server_name = jamnp_core::altname::encode(&expected_peer_key);
        let connecting = endpoint
            .connect_with(client_config, addr, &server_name)
            .map_err(|e| ConnectionError::Closed(e.to_string()))?;

        let quinn_conn = match connecting.await {
            Ok(c) => c,
            Err(e) => {
                warn!(%addr, error = %e, "outbound QUIC connect failed");
                return Err(ConnectionError::ConnectFailed { addr, source: e });
            }
        };

        let conn = Connection::from_quinn(quinn_conn)?;
        debug!(%addr, peer = %hex::encode(conn.peer_key()), "outbound connection established");
        Ok(conn)
    }

    /// Accept the next inbound connection.
    pub async fn accept(&self) -> Result<Connection, ConnectionError> {
        let endpoint = {
            let guard = self.endpoint.read();
            guard.clone().ok_or(ConnectionError::Closed("transport not started".to_string()))?
        };

        let incoming = endpoint.accept().await.ok_or(ConnectionError::Closed("endpoint closed".to_string()))?;
        let quinn_conn = incoming.await.map_err(|e| ConnectionError::Closed(e.to_string()))?;

        let conn = Connection::from_quinn(quinn_conn)?;
        debug!(peer = %hex::encode(conn.peer_key()), remote = %conn.remote_address(), "inbound connection accepted");
        Ok(conn)
    }

    /// Stop accepting new connections, close the endpoint, and wait for
    /// in-flight connections to drain.
    pub async fn shutdown(&self) {
        let endpoint = self.endpoint.write().take();
        if let Some(endpoint) = endpoint {
            info!("QUIC endpoint shutting down, draining open connections");
            endpoint.close(0u32.into(), b"shutdown");
            endpoint.wait_idle().await;
        }
    }
}

impl std::fmt::Debug for QuicTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuicTransport")
            .field("local_key", &hex::encode(self.local_key()))
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn new_transport_has_no_local_addr_until_started() {
        let signing_key = ed25519_dalek::SigningKey::generate(&mut OsRng);
        let genesis_hash = [0u8; 32];
        let alpn = AlpnId::new(&genesis_hash, false);
        let transport =
            QuicTransport::new(signing_key, alpn, "127.0.0.1:0".parse().unwrap()).unwrap();
        assert!(transport.local_addr().is_none());
    }
}
