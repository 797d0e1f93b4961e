//! Loading and generating ECDSA P-256 key material.
//!
//! The auth server reads its signing key from a DER file (SEC1 or PKCS#8);
//! relying parties read the matching public key from SPKI DER.

use std::fs;
use std::path::Path;

use p256::pkcs8::{DecodePrivateKey, DecodePublicKey};
use p256::{PublicKey, SecretKey};
use rand_core::OsRng;

use crate::error::KeyError;

/// Parse a private key from DER bytes, accepting SEC1 (`EC PRIVATE KEY`)
/// or PKCS#8 encodings.
pub fn signing_key_from_der(der: &[u8]) -> Result<SecretKey, KeyError> {
    if let Ok(key) = SecretKey::from_sec1_der(der) {
        return Ok(key);
    }
    SecretKey::from_pkcs8_der(der)
        .map_err(|e| KeyError::Parse(format!("not a SEC1 or PKCS#8 EC private key: {e}")))
}

/// Parse a public key from SPKI DER bytes.
pub fn verification_key_from_der(der: &[u8]) -> Result<PublicKey, KeyError> {
    PublicKey::from_public_key_der(der)
        .map_err(|e| KeyError::Parse(format!("not an SPKI EC public key: {e}")))
}

/// Read and parse a signing key from a DER file on disk.
pub fn read_signing_key(path: impl AsRef<Path>) -> Result<SecretKey, KeyError> {
    let path = path.as_ref();
    let der = fs::read(path).map_err(|source| KeyError::Io {
        path: path.display().to_string(),
        source,
    })?;
    signing_key_from_der(&der)
}

/// Read and parse a verification key from a DER file on disk.
pub fn read_verification_key(path: impl AsRef<Path>) -> Result<PublicKey, KeyError> {
    let path = path.as_ref();
    let der = fs::read(path).map_err(|source| KeyError::Io {
        path: path.display().to_string(),
        source,
    })?;
    verification_key_from_der(&der)
}

/// Generate a fresh P-256 signing key.
pub fn generate_signing_key() -> SecretKey {
    SecretKey::random(&mut OsRng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::pkcs8::{EncodePrivateKey, EncodePublicKey};

    #[test]
    fn pkcs8_der_roundtrip() {
        let key = generate_signing_key();
        let der = key.to_pkcs8_der().unwrap();
        let parsed = signing_key_from_der(der.as_bytes()).unwrap();
        assert_eq!(parsed.to_bytes(), key.to_bytes());
    }

    #[test]
    fn sec1_der_roundtrip() {
        let key = generate_signing_key();
        let der = key.to_sec1_der().unwrap();
        let parsed = signing_key_from_der(&der).unwrap();
        assert_eq!(parsed.to_bytes(), key.to_bytes());
    }

    #[test]
    fn spki_der_roundtrip() {
        let key = generate_signing_key();
        let der = key.public_key().to_public_key_der().unwrap();
        let parsed = verification_key_from_der(der.as_bytes()).unwrap();
        assert_eq!(parsed, key.public_key());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(signing_key_from_der(b"not a key").is_err());
        assert!(verification_key_from_der(b"not a key").is_err());
    }
}
