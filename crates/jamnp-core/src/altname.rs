//! AltName certificate-subject encoding and the JAMNP-S ALPN identifier.
//!
//! `N(k) = "e" ++ B(E32^-1(k), 52)`: a 32-byte Ed25519 public key, read as a
//! little-endian integer, re-expressed in base32 over a 32-symbol alphabet and
//! zero-padded to 52 digits, prefixed with `"e"`. This becomes the SAN DNS
//! entry of a validator's self-signed certificate.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::ids::{Ed25519PublicKey, Hash};

const BASE32_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";
const ALT_NAME_DIGITS: usize = 52;

/// Encode an Ed25519 public key as an AltName string (`e` + 52 base32 digits).
pub fn encode(key: &Ed25519PublicKey) -> String {
    let mut n = BigUint::from_bytes_le(key);

    let mut digits = String::with_capacity(ALT_NAME_DIGITS);
    for _ in 0..ALT_NAME_DIGITS {
        let digit = (&n % 32u32).to_u32_digits().first().copied().unwrap_or(0) as usize;
        digits.push(BASE32_ALPHABET[digit] as char);
        n /= 32u32;
    }

    let mut out = String::with_capacity(1 + ALT_NAME_DIGITS);
    out.push('e');
    out.push_str(&digits);
    out
}

/// Decode an AltName string back into the 32-byte key it was derived from.
pub fn decode(alt_name: &str) -> Result<Ed25519PublicKey, CodecError> {
    let digits = alt_name
        .strip_prefix('e')
        .ok_or_else(|| CodecError::InvalidAltName(alt_name.to_string()))?;

    if digits.len() != ALT_NAME_DIGITS {
        return Err(CodecError::InvalidAltName(alt_name.to_string()));
    }

    let mut n = BigUint::from(0u32);
    for (place, ch) in digits.chars().enumerate() {
        let digit = BASE32_ALPHABET
            .iter()
            .position(|&b| b as char == ch)
            .ok_or_else(|| CodecError::InvalidAltName(alt_name.to_string()))?;
        n += BigUint::from(digit as u32) * BigUint::from(32u32).pow(place as u32);
    }

    let mut bytes = n.to_bytes_le();
    if bytes.len() > 32 {
        return Err(CodecError::InvalidAltName(alt_name.to_string()));
    }
    bytes.resize(32, 0);

    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

/// Returns `true` iff `s` matches `/^e[a-z2-7]{52}$/`.
pub fn is_well_formed(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 1 + ALT_NAME_DIGITS
        && bytes[0] == b'e'
        && bytes[1..].iter().all(|&b| BASE32_ALPHABET.contains(&b))
}

/// JAMNP-S ALPN identifier: `jamnp-s/{role}/{genesis_hash_prefix}` where
/// `role` is `v` (validator) or `b` (builder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlpnId {
    pub is_builder: bool,
    pub genesis_hash_prefix: String,
}

impl AlpnId {
    /// Construct an ALPN id from the genesis header hash, taking its first 4 bytes (8 hex nibbles).
    pub fn new(genesis_hash: &Hash, is_builder: bool) -> Self {
        Self {
            is_builder,
            genesis_hash_prefix: hex::encode(&genesis_hash[..4]),
        }
    }

    fn role(&self) -> &'static str {
        if self.is_builder { "b" } else { "v" }
    }

    /// Parse an ALPN protocol string back into its components.
    pub fn parse(s: &str) -> Result<Self, CodecError> {
        let mut parts = s.split('/');
        if parts.next() != Some("jamnp-s") {
            return Err(CodecError::InvalidAltName(s.to_string()));
        }
        let is_builder = match parts.next() {
            Some("v") => false,
            Some("b") => true,
            _ => return Err(CodecError::InvalidAltName(s.to_string())),
        };
        let genesis_hash_prefix = parts
            .next()
            .filter(|p| p.len() == 8 && p.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| CodecError::InvalidAltName(s.to_string()))?
            .to_string();
        if parts.next().is_some() {
            return Err(CodecError::InvalidAltName(s.to_string()));
        }
        Ok(Self { is_builder, genesis_hash_prefix })
    }
}

impl std::fmt::Display for AlpnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "jamnp-s/{}/{}", self.role(), self.genesis_hash_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[test]
    fn alt_name_bijection_zero_key() {
        let key = [0u8; 32];
        let encoded = encode(&key);
        assert!(is_well_formed(&encoded));
        assert_eq!(decode(&encoded).unwrap(), key);
    }

    #[test]
    fn alt_name_bijection_random_keys() {
        let mut rng = rand::thread_rng();
        for _ in 0..64 {
            let mut key = [0u8; 32];
            rng.fill_bytes(&mut key);
            let encoded = encode(&key);
            assert!(is_well_formed(&encoded), "{encoded} not well-formed");
            assert_eq!(decode(&encoded).unwrap(), key);
        }
    }

    #[test]
    fn alt_name_shape() {
        let key = [0u8; 32];
        let encoded = encode(&key);
        assert_eq!(encoded.len(), 53);
        assert!(encoded.starts_with('e'));
    }

    #[test]
    fn alpn_id_roundtrips_through_display_and_parse() {
        let genesis_hash = [0xAB; 32];
        let alpn = AlpnId::new(&genesis_hash, false);
        assert_eq!(alpn.to_string(), "jamnp-s/v/abababab");
        assert_eq!(AlpnId::parse(&alpn.to_string()).unwrap(), alpn);

        let builder = AlpnId::new(&genesis_hash, true);
        assert_eq!(builder.to_string(), "jamnp-s/b/abababab");
        assert_eq!(AlpnId::parse(&builder.to_string()).unwrap(), builder);
    }
}
