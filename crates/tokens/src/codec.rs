//! Wire-level JWT encoding and decoding.
//!
//! A token is three URL-safe-base64 (no padding) segments joined by `.`:
//! header, claims, signature. The signature is the raw 64-byte `r || s`
//! form of an ECDSA P-256 signature over the SHA-256 digest of
//! `header_b64 "." claims_b64`, with each integer right-aligned in its
//! 32-byte half.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::{Signature, VerifyingKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::TokenError;
use crate::{Issuer, Validator};

/// Length of the raw `r || s` signature.
pub(crate) const SIGNATURE_LEN: usize = 64;

/// The only header this codec emits or accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtHeader {
    #[serde(rename = "alg")]
    pub algorithm: String,
    #[serde(rename = "typ")]
    pub token_type: String,
}

impl JwtHeader {
    pub fn es256() -> Self {
        JwtHeader {
            algorithm: "ES256".into(),
            token_type: "JWT".into(),
        }
    }
}

/// Claims that can ride in a token. Sealed to the two claim sets this
/// service issues; `validate` runs the ordered checks of the decode path.
pub trait TokenClaims: Serialize + DeserializeOwned {
    fn validate(&self, validator: &dyn Validator) -> Result<(), TokenError>;
}

/// Generate a CSRF secret: 32 random bytes, URL-safe-base64 without padding.
pub fn generate_csrf_secret() -> Result<String, TokenError> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)
        .map_err(|e| TokenError::Signing(format!("csrf secret rng failure: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

pub(crate) fn encode_section<T: Serialize>(section: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(section)
        .map_err(|e| TokenError::Signing(format!("json marshal failure: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

pub(crate) fn decode_section<T: DeserializeOwned>(section: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(section)
        .map_err(|e| TokenError::Malformed(format!("invalid base64 encoding: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed(format!("not valid JSON: {e}")))
}

pub(crate) fn build_message(enc_header: &str, enc_claims: &str) -> String {
    format!("{enc_header}.{enc_claims}")
}

pub(crate) fn hash_message(message: &str) -> [u8; 32] {
    Sha256::digest(message.as_bytes()).into()
}

/// Serialize a signature as 64 bytes: r right-aligned in bytes [0..32),
/// s right-aligned in bytes [32..64). `split_bytes` already yields both
/// scalars as zero-padded 32-byte big-endian fields, which is exactly the
/// fixed-width layout the wire format demands.
pub(crate) fn encode_signature(signature: &Signature) -> String {
    let (r, s) = signature.split_bytes();
    let mut raw = [0u8; SIGNATURE_LEN];
    raw[..32].copy_from_slice(&r);
    raw[32..].copy_from_slice(&s);
    URL_SAFE_NO_PAD.encode(raw)
}

pub(crate) fn decode_signature(raw: &[u8]) -> Result<Signature, TokenError> {
    if raw.len() != SIGNATURE_LEN {
        return Err(TokenError::BadSignature(format!(
            "invalid signature length: {}",
            raw.len()
        )));
    }
    Signature::from_slice(raw)
        .map_err(|e| TokenError::BadSignature(format!("failed to decode signature: {e}")))
}

pub(crate) fn verify_signature(
    enc_header: &str,
    enc_claims: &str,
    enc_signature: &str,
    verification_key: &VerifyingKey,
) -> Result<(), TokenError> {
    let raw = URL_SAFE_NO_PAD
        .decode(enc_signature)
        .map_err(|e| TokenError::BadSignature(format!("invalid base64 encoding: {e}")))?;
    let signature = decode_signature(&raw)?;

    let digest = hash_message(&build_message(enc_header, enc_claims));
    verification_key
        .verify_prehash(&digest, &signature)
        .map_err(|_| TokenError::BadSignature("verification failed".into()))
}

pub(crate) fn encode_token<C: TokenClaims>(
    claims: &C,
    issuer: &dyn Issuer,
) -> Result<String, TokenError> {
    let enc_header = encode_section(&JwtHeader::es256())?;
    let enc_claims = encode_section(claims)?;
    let message = build_message(&enc_header, &enc_claims);
    let enc_signature = issuer.sign_digest(&hash_message(&message))?;
    Ok(format!("{message}.{enc_signature}"))
}

fn split_token(token: &str) -> Result<(&str, &str, &str), TokenError> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(claims), Some(signature), None) => Ok((header, claims, signature)),
        _ => Err(TokenError::Malformed(
            "JWT expected exactly three parts".into(),
        )),
    }
}

fn verify_header(header: &JwtHeader) -> Result<(), TokenError> {
    if header.token_type != "JWT" {
        return Err(TokenError::BadSignature(format!(
            "illegal type: {}",
            header.token_type
        )));
    }
    if header.algorithm != "ES256" {
        return Err(TokenError::BadSignature(format!(
            "illegal algorithm: {}",
            header.algorithm
        )));
    }
    Ok(())
}

pub(crate) fn decode_token<C: TokenClaims>(
    token: &str,
    validator: &dyn Validator,
) -> Result<C, TokenError> {
    let (enc_header, enc_claims, enc_signature) = split_token(token)?;

    let header: JwtHeader = decode_section(enc_header)?;
    verify_header(&header)?;

    validator.verify_signature(enc_header, enc_claims, enc_signature)?;

    let claims: C = decode_section(enc_claims)?;
    claims.validate(validator)?;

    Ok(claims)
}

/// Shared time/issuer/audience checks for both claim sets, in spec order:
/// `iat` not in the future, `exp` not in the past, issuer match, then
/// audience membership when the validator enforces it.
pub(crate) fn validate_registered_claims(
    issued_at: i64,
    expiration: i64,
    issuer: &str,
    audience: &str,
    validator: &dyn Validator,
) -> Result<(), TokenError> {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    let skew = validator.clock_skew();

    if issued_at > now + skew {
        return Err(TokenError::NotIssued);
    }
    if expiration < now - skew {
        return Err(TokenError::Expired);
    }
    if !validator.validate_domain(issuer) {
        return Err(TokenError::InvalidIssuer);
    }
    if validator.should_validate_audience() && !validator.validate_audience(audience) {
        return Err(TokenError::InvalidAudience);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::SigningKey;
    use p256::ecdsa::signature::hazmat::PrehashSigner;

    fn test_key() -> SigningKey {
        SigningKey::from(crate::keys::generate_signing_key())
    }

    #[test]
    fn header_serializes_to_exact_fields() {
        let json = serde_json::to_string(&JwtHeader::es256()).unwrap();
        assert_eq!(json, r#"{"alg":"ES256","typ":"JWT"}"#);
    }

    #[test]
    fn csrf_secret_is_urlsafe_and_unique() {
        let a = generate_csrf_secret().unwrap();
        let b = generate_csrf_secret().unwrap();
        assert_ne!(a, b);
        // 32 bytes base64 without padding
        assert_eq!(a.len(), 43);
        assert!(!a.contains('+') && !a.contains('/') && !a.contains('='));
    }

    #[test]
    fn signature_roundtrip_is_fixed_width() {
        let key = test_key();
        let digest = hash_message("header.claims");

        // Sign enough messages that leading-zero r/s bytes show up; the
        // fixed-width layout must survive every one of them.
        for i in 0..512 {
            let digest = hash_message(&format!("header.claims{i}"));
            let signature: Signature = key.sign_prehash(&digest).unwrap();
            let encoded = encode_signature(&signature);
            let raw = URL_SAFE_NO_PAD.decode(&encoded).unwrap();
            assert_eq!(raw.len(), SIGNATURE_LEN);
            let decoded = decode_signature(&raw).unwrap();
            assert_eq!(&decoded, &signature);
        }

        let signature: Signature = key.sign_prehash(&digest).unwrap();
        let encoded = encode_signature(&signature);
        assert!(
            verify_signature(
                "header",
                "claims",
                &encoded,
                &VerifyingKey::from(&key),
            )
            .is_ok()
        );
    }

    #[test]
    fn truncated_signature_is_rejected() {
        let err = decode_signature(&[0u8; 63]).unwrap_err();
        assert!(matches!(err, TokenError::BadSignature(_)));
    }

    #[test]
    fn split_requires_three_parts() {
        assert!(matches!(
            split_token("a.b").unwrap_err(),
            TokenError::Malformed(_)
        ));
        assert!(matches!(
            split_token("a.b.c.d").unwrap_err(),
            TokenError::Malformed(_)
        ));
        assert!(split_token("a.b.c").is_ok());
    }

    #[test]
    fn wrong_algorithm_and_type_are_bad_signature() {
        let hs256 = JwtHeader {
            algorithm: "HS256".into(),
            token_type: "JWT".into(),
        };
        assert!(matches!(
            verify_header(&hs256).unwrap_err(),
            TokenError::BadSignature(_)
        ));

        let not_jwt = JwtHeader {
            algorithm: "ES256".into(),
            token_type: "JWS".into(),
        };
        assert!(matches!(
            verify_header(&not_jwt).unwrap_err(),
            TokenError::BadSignature(_)
        ));
    }
}
