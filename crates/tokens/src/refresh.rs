//! Refresh tokens: long-lived, single-use tokens that rotate into fresh
//! (access, refresh) pairs and carry the session's CSRF secret.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::access::unix_time;
use crate::codec::{TokenClaims, decode_token, validate_registered_claims};
use crate::error::TokenError;
use crate::Validator;

/// The claims section of a refresh token as it appears on the wire.
///
/// Identical to the access-token claims plus `secret`, the URL-safe-base64
/// CSRF binding for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    #[serde(rename = "exp")]
    pub expiration: i64,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "iss")]
    pub issuer: String,
    #[serde(rename = "aud")]
    pub audience: String,
    #[serde(rename = "sub")]
    pub subject: String,
    pub secret: String,
}

impl TokenClaims for RefreshTokenClaims {
    fn validate(&self, validator: &dyn Validator) -> Result<(), TokenError> {
        validate_registered_claims(
            self.issued_at,
            self.expiration,
            &self.issuer,
            &self.audience,
            validator,
        )
    }
}

/// A decoded, validated refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    issuer: String,
    issued_at: OffsetDateTime,
    expiration: OffsetDateTime,
    audience: Vec<String>,
    subject: String,
    secret: String,
    encoded: String,
}

impl RefreshToken {
    /// Decode and validate an encoded token against `validator`.
    pub fn decode(encoded: &str, validator: &dyn Validator) -> Result<Self, TokenError> {
        let claims: RefreshTokenClaims = decode_token(encoded, validator)?;
        Self::from_claims(claims, encoded)
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn issued_at(&self) -> OffsetDateTime {
        self.issued_at
    }

    pub fn expiration(&self) -> OffsetDateTime {
        self.expiration
    }

    pub fn audience(&self) -> &[String] {
        &self.audience
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The CSRF secret bound to this session.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    pub(crate) fn new(
        issuer: String,
        issued_at: OffsetDateTime,
        expiration: OffsetDateTime,
        audience: Vec<String>,
        subject: String,
        secret: String,
        encoded: String,
    ) -> Self {
        RefreshToken {
            issuer,
            issued_at,
            expiration,
            audience,
            subject,
            secret,
            encoded,
        }
    }

    pub(crate) fn into_claims(&self) -> RefreshTokenClaims {
        RefreshTokenClaims {
            expiration: self.expiration.unix_timestamp(),
            issued_at: self.issued_at.unix_timestamp(),
            issuer: self.issuer.clone(),
            audience: self.audience.join(" "),
            subject: self.subject.clone(),
            secret: self.secret.clone(),
        }
    }

    fn from_claims(claims: RefreshTokenClaims, encoded: &str) -> Result<Self, TokenError> {
        Ok(RefreshToken {
            issuer: claims.issuer,
            issued_at: unix_time(claims.issued_at)?,
            expiration: unix_time(claims.expiration)?,
            audience: claims
                .audience
                .split(' ')
                .map(str::to_owned)
                .collect(),
            subject: claims.subject,
            secret: claims.secret,
            encoded: encoded.to_owned(),
        })
    }
}
