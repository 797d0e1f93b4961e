//! The server role: holds the private signing key, issues tokens, and
//! validates them without enforcing audience (the server issues for many
//! audiences and must accept any of them).

use std::time::Duration;

use p256::SecretKey;
use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use time::OffsetDateTime;

use crate::codec::{encode_signature, encode_token, generate_csrf_secret, verify_signature};
use crate::error::TokenError;
use crate::{AccessToken, Issuer, RefreshToken, Validator};

/// Issuer and validator for the consent auth server.
///
/// Built from the ECDSA P-256 signing key; the verification key is derived.
pub struct TokenServer {
    signing_key: SigningKey,
    verification_key: VerifyingKey,
    issuer_domain: String,
    clock_skew: i64,
}

impl TokenServer {
    pub fn new(signing_key: SecretKey, issuer_domain: impl Into<String>) -> Self {
        let signing_key = SigningKey::from(signing_key);
        let verification_key = VerifyingKey::from(&signing_key);
        TokenServer {
            signing_key,
            verification_key,
            issuer_domain: issuer_domain.into(),
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

    /// The public half of the signing key, for distribution to clients.
    pub fn verification_key(&self) -> &VerifyingKey {
        &self.verification_key
    }

    /// Issue an access token as of `issued_at` rather than now. This is how
    /// fixtures mint already-expired tokens; [`Issuer::issue_access_token`]
    /// is this anchored at the current time.
    pub fn issue_access_token_at(
        &self,
        subject: &str,
        audience: &[String],
        issued_at: OffsetDateTime,
        lifetime: Duration,
    ) -> Result<AccessToken, TokenError> {
        let expiration = issued_at + lifetime;
        let token = AccessToken::new(
            self.issuer_domain.clone(),
            issued_at,
            expiration,
            audience.to_vec(),
            subject.to_owned(),
            String::new(),
        );
        let encoded = encode_token(&token.into_claims(), self)?;

        Ok(AccessToken::new(
            self.issuer_domain.clone(),
            issued_at,
            expiration,
            audience.to_vec(),
            subject.to_owned(),
            encoded,
        ))
    }

    /// Issue a refresh token as of `issued_at` rather than now.
    pub fn issue_refresh_token_at(
        &self,
        subject: &str,
        audience: &[String],
        issued_at: OffsetDateTime,
        lifetime: Duration,
    ) -> Result<RefreshToken, TokenError> {
        let expiration = issued_at + lifetime;
        let secret = generate_csrf_secret()?;
        let token = RefreshToken::new(
            self.issuer_domain.clone(),
            issued_at,
            expiration,
            audience.to_vec(),
            subject.to_owned(),
            secret.clone(),
            String::new(),
        );
        let encoded = encode_token(&token.into_claims(), self)?;

        Ok(RefreshToken::new(
            self.issuer_domain.clone(),
            issued_at,
            expiration,
            audience.to_vec(),
            subject.to_owned(),
            secret,
            encoded,
        ))
    }
}

impl Issuer for TokenServer {
    fn sign_digest(&self, digest: &[u8; 32]) -> Result<String, TokenError> {
        let signature: Signature = self
            .signing_key
            .sign_prehash(digest)
            .map_err(|e| TokenError::Signing(format!("failed to sign message: {e}")))?;
        Ok(encode_signature(&signature))
    }

    fn issue_access_token(
        &self,
        subject: &str,
        audience: &[String],
        lifetime: Duration,
    ) -> Result<AccessToken, TokenError> {
        self.issue_access_token_at(subject, audience, OffsetDateTime::now_utc(), lifetime)
    }

    fn issue_refresh_token(
        &self,
        subject: &str,
        audience: &[String],
        lifetime: Duration,
    ) -> Result<RefreshToken, TokenError> {
        self.issue_refresh_token_at(subject, audience, OffsetDateTime::now_utc(), lifetime)
    }
}

impl Validator for TokenServer {
    fn should_validate_audience(&self) -> bool {
        false
    }

    fn validate_domain(&self, issuer_domain: &str) -> bool {
        issuer_domain == self.issuer_domain
    }

    fn validate_audience(&self, _audience: &str) -> bool {
        false
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
