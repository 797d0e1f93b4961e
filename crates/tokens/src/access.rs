//! Access tokens: short-lived proof of identity presented to relying
//! parties on every request.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::codec::{TokenClaims, decode_token, validate_registered_claims};
use crate::error::TokenError;
use crate::Validator;

/// The claims section of an access token as it appears on the wire.
///
/// `aud` is a single space-separated string; the decoded [`AccessToken`]
/// splits it back into a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
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
}

impl TokenClaims for AccessTokenClaims {
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

/// A decoded, validated access token.
///
/// Access tokens are issued by the auth server and validated by backend
/// applications; they carry the user's identity (subject) and the intended
/// applications (audience). Typical lifetime is 30 minutes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    issuer: String,
    issued_at: OffsetDateTime,
    expiration: OffsetDateTime,
    audience: Vec<String>,
    subject: String,
    encoded: String,
}

impl AccessToken {
    /// Decode and validate an encoded token against `validator`.
    pub fn decode(encoded: &str, validator: &dyn Validator) -> Result<Self, TokenError> {
        let claims: AccessTokenClaims = decode_token(encoded, validator)?;
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

    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    pub(crate) fn new(
        issuer: String,
        issued_at: OffsetDateTime,
        expiration: OffsetDateTime,
        audience: Vec<String>,
        subject: String,
        encoded: String,
    ) -> Self {
        AccessToken {
            issuer,
            issued_at,
            expiration,
            audience,
            subject,
            encoded,
        }
    }

    pub(crate) fn into_claims(&self) -> AccessTokenClaims {
        AccessTokenClaims {
            expiration: self.expiration.unix_timestamp(),
            issued_at: self.issued_at.unix_timestamp(),
            issuer: self.issuer.clone(),
            audience: self.audience.join(" "),
            subject: self.subject.clone(),
        }
    }

    fn from_claims(claims: AccessTokenClaims, encoded: &str) -> Result<Self, TokenError> {
        Ok(AccessToken {
            issuer: claims.issuer,
            issued_at: unix_time(claims.issued_at)?,
            expiration: unix_time(claims.expiration)?,
            audience: claims
                .audience
                .split(' ')
                .map(str::to_owned)
                .collect(),
            subject: claims.subject,
            encoded: encoded.to_owned(),
        })
    }
}

pub(crate) fn unix_time(secs: i64) -> Result<OffsetDateTime, TokenError> {
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|e| TokenError::Malformed(format!("timestamp out of range: {e}")))
}
