//! Self-signed certificate generation and peer-set verification.
//!
//! Every validator presents a self-signed X.509 certificate whose SAN DNS
//! entry is its Ed25519 key, AltName-encoded (`jamnp_core::altname`). There is
//! no CA: a peer is trusted iff its certificate's SAN decodes to a key the
//! caller already expects to see (the dialled validator's key on connect, or
//! any member of the current/previous/next validator sets on accept). The SAN
//! is read out of the presented certificate itself, not out of the SNI we
//! dialled with, so a relay can't swap certs under an accepted name.

use std::sync::Arc;

use jamnp_core::altname;
use jamnp_core::ids::Ed25519PublicKey;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::FromDer;

use crate::error::{ConnectionError, TransportError};

/// A generated certificate and its private key, ready to hand to rustls.
pub struct JamCertificate {
    pub cert: CertificateDer<'static>,
    pub key: PrivateKeyDer<'static>,
    pub alt_name: String,
}

/// Generate a self-signed certificate whose SAN DNS entry is `key`'s AltName.
pub fn generate_self_signed(key: &Ed25519PublicKey) -> Result<JamCertificate, TransportError> {
    let alt_name = altname::encode(key);

    let certified_key = rcgen::generate_simple_self_signed(vec![alt_name.clone()])
        .map_err(|e| TransportError::CertGeneration(e.to_string()))?;

    let cert = CertificateDer::from(certified_key.cert.der().to_vec());
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified_key.key_pair.serialize_der()));

    Ok(JamCertificate { cert, key, alt_name })
}

/// Pull the first DNS SAN entry out of a leaf certificate's DER encoding.
fn dns_san(der: &CertificateDer<'_>) -> Result<String, ConnectionError> {
    let (_, cert) = x509_parser::certificate::X509Certificate::from_der(der.as_ref())
        .map_err(|e| ConnectionError::CertSubjectMismatch(e.to_string()))?;

    let san_ext = cert
        .subject_alternative_name()
        .map_err(|e| ConnectionError::CertSubjectMismatch(e.to_string()))?
        .ok_or_else(|| ConnectionError::CertSubjectMismatch("no SAN extension".to_string()))?;

    san_ext
        .value
        .general_names
        .iter()
        .find_map(|name| match name {
            GeneralName::DNSName(dns) => Some((*dns).to_string()),
            _ => None,
        })
        .ok_or_else(|| ConnectionError::CertSubjectMismatch("no DNS SAN entry".to_string()))
}

/// Decode the AltName-encoded Ed25519 key out of a peer's leaf certificate.
pub fn peer_key_from_cert(der: &CertificateDer<'_>) -> Result<Ed25519PublicKey, ConnectionError> {
    let alt_name = dns_san(der)?;
    altname::decode(&alt_name).map_err(|e| ConnectionError::CertSubjectMismatch(e.to_string()))
}

fn ed25519_verify_schemes() -> Vec<rustls::SignatureScheme> {
    vec![rustls::SignatureScheme::ED25519]
}

/// Client-side verifier: accepts a server certificate iff its SAN decodes to
/// a key `allowed` approves of.
pub struct PeerSetServerVerifier {
    allowed: Arc<dyn Fn(&Ed25519PublicKey) -> bool + Send + Sync>,
}

impl std::fmt::Debug for PeerSetServerVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerSetServerVerifier").finish_non_exhaustive()
    }
}

impl PeerSetServerVerifier {
    pub fn new(allowed: impl Fn(&Ed25519PublicKey) -> bool + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self { allowed: Arc::new(allowed) })
    }
}

impl rustls::client::danger::ServerCertVerifier for PeerSetServerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        let key = peer_key_from_cert(end_entity).map_err(|e| rustls::Error::General(e.to_string()))?;

        if (self.allowed)(&key) {
            Ok(rustls::client::danger::ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::General("peer key not in current validator set".into()))
        }
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        ed25519_verify_schemes()
    }
}

/// Server-side verifier: accepts a client certificate (mutual TLS) iff its
/// SAN decodes to a key `allowed` approves of. Client auth is mandatory:
/// JAMNP-S has no anonymous connections.
pub struct PeerSetClientVerifier {
    allowed: Arc<dyn Fn(&Ed25519PublicKey) -> bool + Send + Sync>,
}

impl std::fmt::Debug for PeerSetClientVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerSetClientVerifier").finish_non_exhaustive()
    }
}

impl PeerSetClientVerifier {
    pub fn new(allowed: impl Fn(&Ed25519PublicKey) -> bool + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self { allowed: Arc::new(allowed) })
    }
}

impl rustls::server::danger::ClientCertVerifier for PeerSetClientVerifier {
    fn root_hint_subjects(&self) -> &[rustls::DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::server::danger::ClientCertVerified, rustls::Error> {
        let key = peer_key_from_cert(end_entity).map_err(|e| rustls::Error::General(e.to_string()))?;

        if (self.allowed)(&key) {
            Ok(rustls::server::danger::ClientCertVerified::assertion())
        } else {
            Err(rustls::Error::General("peer key not in current validator set".into()))
        }
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        ed25519_verify_schemes()
    }

    fn client_auth_mandatory(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_cert_alt_name_matches_key() {
        let key = [42u8; 32];
        let cert = generate_self_signed(&key).unwrap();
        assert!(jamnp_core::altname::is_well_formed(&cert.alt_name));
        assert_eq!(peer_key_from_cert(&cert.cert).unwrap(), key);
    }

    #[test]
    fn peer_set_server_verifier_rejects_unknown_key() {
        let key = [7u8; 32];
        let cert = generate_self_signed(&key).unwrap();

        let verifier = PeerSetServerVerifier::new(|k| *k == [9u8; 32]);
        let result = rustls::client::danger::ServerCertVerifier::verify_server_cert(
            verifier.as_ref(),
            &cert.cert,
            &[],
            &rustls::pki_types::ServerName::try_from("e".repeat(53)).unwrap(),
            &[],
            rustls::pki_types::UnixTime::now(),
        );
        assert!(result.is_err());
    }
}
