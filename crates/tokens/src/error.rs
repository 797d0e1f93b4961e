use thiserror::Error;

/// Failure kinds produced while encoding or decoding tokens.
///
/// Validation short-circuits on the first failing check, so callers can rely
/// on the variant to tell them exactly which check rejected the token.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TokenError {
    /// Token structure or JSON could not be parsed.
    #[error("token malformed: {0}")]
    Malformed(String),
    /// Header was not ES256/JWT, or the ECDSA signature did not verify.
    #[error("token bad signature: {0}")]
    BadSignature(String),
    /// `exp` is in the past.
    #[error("token expired")]
    Expired,
    /// `iat` is in the future.
    #[error("token not issued yet")]
    NotIssued,
    /// `iss` does not match the validator's issuer domain.
    #[error("token issuer not recognized")]
    InvalidIssuer,
    /// `aud` does not contain the validator's audience.
    #[error("token audience not accepted")]
    InvalidAudience,
    /// Signing-side failure (RNG, serialization, ECDSA).
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl TokenError {
    /// True for the one failure a relying party can recover from by
    /// refreshing: an expired token.
    pub fn is_expired(&self) -> bool {
        matches!(self, TokenError::Expired)
    }
}

/// Failures while loading key material from disk.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("failed to read key file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse key: {0}")]
    Parse(String),
}
