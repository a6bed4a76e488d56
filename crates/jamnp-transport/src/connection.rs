//! An established QUIC connection to one peer, and the streams opened on it.

use jamnp_core::framing::{Frame, StreamKind};
use jamnp_core::ids::Ed25519PublicKey;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::cert::peer_key_from_cert;
use crate::error::ConnectionError;

/// A stream multiplexed over a [`Connection`], already tagged with its kind.
pub struct Stream {
    kind: StreamKind,
    send: Mutex<quinn::SendStream>,
    recv: Mutex<quinn::RecvStream>,
    recv_buf: Mutex<Vec<u8>>,
}

impl Stream {
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Write one frame (`len(u32 LE) ‖ bytes`) to the stream.
    pub async fn send_frame(&self, payload: &[u8]) -> Result<(), ConnectionError> {
        let mut send = self.send.lock().await;
        send.write_all(&Frame::encode(payload)).await.map_err(|e| ConnectionError::StreamIo(e.to_string()))?;
        Ok(())
    }

    /// Read the next frame's payload, buffering any over-read bytes for the
    /// following call.
    pub async fn recv_frame(&self) -> Result<Vec<u8>, ConnectionError> {
        let mut recv = self.recv.lock().await;
        let mut buf = self.recv_buf.lock().await;

        loop {
            if let Ok((payload, consumed)) = Frame::decode(&buf) {
                buf.drain(..consumed);
                return Ok(payload);
            }

            let mut chunk = [0u8; 4096];
            let n = recv
                .read(&mut chunk)
                .await
                .map_err(|e| ConnectionError::StreamIo(e.to_string()))?
                .ok_or_else(|| ConnectionError::Closed("stream finished".to_string()))?;
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    pub async fn close(&self) -> Result<(), ConnectionError> {
        let mut send = self.send.lock().await;
        send.finish().map_err(|e| ConnectionError::Closed(e.to_string()))
    }
}

/// An established, mutually-authenticated connection to a single peer.
pub struct Connection {
    inner: quinn::Connection,
    peer_key: Ed25519PublicKey,
}

impl Connection {
    pub(crate) fn from_quinn(inner: quinn::Connection) -> Result<Self, ConnectionError> {
        let peer_key = extract_peer_key(&inner)?;
        Ok(Self { inner, peer_key })
    }

    /// The peer's Ed25519 key, taken from its certificate (not just its address).
    pub fn peer_key(&self) -> Ed25519PublicKey {
        self.peer_key
    }

    pub fn remote_address(&self) -> std::net::SocketAddr {
        self.inner.remote_address()
    }

    pub fn is_alive(&self) -> bool {
        self.inner.close_reason().is_none()
    }

    pub fn rtt(&self) -> std::time::Duration {
        self.inner.stats().path.rtt
    }

    /// Open a new stream, writing the stream-kind byte as the first thing on it.
    pub async fn open_stream(&self, kind: StreamKind) -> Result<Stream, ConnectionError> {
        let (mut send, recv) = self.inner.open_bi().await.map_err(|e| ConnectionError::ConnectFailed {
            addr: self.inner.remote_address(),
            source: e,
        })?;
        send.write_all(&[kind.to_byte()]).await.map_err(|e| ConnectionError::StreamIo(e.to_string()))?;

        Ok(Stream { kind, send: Mutex::new(send), recv: Mutex::new(recv), recv_buf: Mutex::new(Vec::new()) })
    }

    /// Accept the next stream the peer opens, reading its kind byte.
    pub async fn accept_stream(&self) -> Result<Stream, ConnectionError> {
        let (send, mut recv) = self
            .inner
            .accept_bi()
            .await
            .map_err(|e| ConnectionError::Closed(e.to_string()))?;

        let mut kind_byte = [0u8; 1];
        recv.read_exact(&mut kind_byte).await.map_err(|e| ConnectionError::Closed(e.to_string()))?;
        let kind = StreamKind::from_byte(kind_byte[0]);

        Ok(Stream { kind, send: Mutex::new(send), recv: Mutex::new(recv), recv_buf: Mutex::new(Vec::new()) })
    }

    pub fn close(&self, reason: &str) {
        self.inner.close(0u32.into(), reason.as_bytes());
    }
}

fn extract_peer_key(connection: &quinn::Connection) -> Result<Ed25519PublicKey, ConnectionError> {
    let identity = connection
        .peer_identity()
        .ok_or_else(|| ConnectionError::CertSubjectMismatch("no peer certificate presented".to_string()))?;

    let certs = identity
        .downcast::<Vec<rustls::pki_types::CertificateDer<'static>>>()
        .map_err(|_| ConnectionError::CertSubjectMismatch("unexpected peer identity type".to_string()))?;

    let leaf = certs.first().ok_or_else(|| ConnectionError::CertSubjectMismatch("empty certificate chain".to_string()))?;

    peer_key_from_cert(leaf)
}
