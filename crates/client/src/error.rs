use thiserror::Error;

/// Failures surfaced by the relying-party verifier.
///
/// The token codec's own failure kinds collapse here into "refreshable"
/// (absent or expired, which triggers a refresh attempt) versus everything
/// else ([`VerifyError::TokenInvalid`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum VerifyError {
    /// No token cookie was present on the request.
    #[error("no token present")]
    TokenAbsent,
    /// A token was present but failed validation non-refreshably.
    #[error("token invalid")]
    TokenInvalid,
    /// The caller-supplied CSRF secret did not match the refresh token's.
    #[error("csrf secret mismatch")]
    CsrfInvalid,
    /// The refresh call to the auth server failed, or returned tokens that
    /// did not validate.
    #[error("token refresh failed: {0}")]
    NetworkRefresh(String),
}
