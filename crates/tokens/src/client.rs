//! The client role: backend applications hold only the public key and a
//! single expected audience, and reject tokens not intended for them.

use std::time::Duration;

use p256::PublicKey;
use p256::ecdsa::VerifyingKey;

use crate::codec::verify_signature;
use crate::error::TokenError;
use crate::Validator;

/// Validator for relying parties integrating with consent.
pub struct TokenClient {
    verification_key: VerifyingKey,
    issuer_domain: String,
    valid_audience: String,
    clock_skew: i64,
}

impl TokenClient {
    pub fn new(
        verification_key: PublicKey,
        issuer_domain: impl Into<String>,
        valid_audience: impl Into<String>,
    ) -> Self {
        TokenClient {
            verification_key: VerifyingKey::from(verification_key),
            issuer_domain: issuer_domain.into(),
            valid_audience: valid_audience.into(),
            clock_skew: 0,
        }
    }

    /// Allow `skew` seconds of clock drift on `iat`/`exp` checks.
    /// Defaults to zero.
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew.as_secs() as i64;
        self
    }

    pub fn issuer_domain(&self) -> &str {
        &self.issuer_domain
    }

    pub fn valid_audience(&self) -> &str {
        &self.valid_audience
    }
}

impl Validator for TokenClient {
    fn should_validate_audience(&self) -> bool {
        true
    }

    fn validate_domain(&self, issuer_domain: &str) -> bool {
        issuer_domain == self.issuer_domain
    }

    fn validate_audience(&self, audience: &str) -> bool {
        audience.split(' ').any(|a| a == self.valid_audience)
    }

    fn verify_signature(
        &self,
        enc_header: &str,
        enc_claims: &str,
        enc_signature: &str,
    ) -> Result<(), TokenError> {
        verify_signature(enc_header, enc_claims, enc_signature, &self.verification_key)
    }

    fn clock_skew(&self) -> i64 {
        self.clock_skew
    }
}
