//! Relying-party verifier for the consent authorization service.
//!
//! Backend applications hold the auth server's public key and check incoming
//! requests with [`AuthClient`]: the access token is read from a cookie and
//! validated locally; an expired (or absent) access token with a valid
//! refresh cookie triggers a transparent, single-use refresh against the
//! auth server, and the rotated pair is written back as cookies.
//!
//! Applications should depend on the [`Verifier`] trait rather than
//! [`AuthClient`] so tests can substitute [`testing::TestVerifier`], which
//! implements the same contract without a network.

use std::time::Duration;

use async_trait::async_trait;
use axum::response::Redirect;
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use consent_tokens::error::TokenError;
use consent_tokens::{AccessToken, RefreshToken, TokenClient};

pub mod cookies;
mod error;
pub mod testing;

pub use cookies::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, clear_token_cookies};
pub use error::VerifyError;

/// Default bound on the outbound refresh call.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Checks whether a request carries a valid authorization, refreshing
/// transparently where the contract allows it.
///
/// Every entry point takes the request's cookie jar and returns the
/// (possibly updated) jar; handlers return that jar so refreshed cookies
/// reach the response.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Validate the access cookie, refreshing via the refresh cookie if the
    /// access token is absent or expired.
    async fn verify_authorization(
        &self,
        jar: CookieJar,
    ) -> (CookieJar, Result<AccessToken, VerifyError>);

    /// [`Verifier::verify_authorization`], then also return the CSRF secret
    /// of the (possibly just-rotated) refresh token.
    async fn verify_authorization_get_csrf(
        &self,
        jar: CookieJar,
    ) -> (CookieJar, Result<(AccessToken, String), VerifyError>);

    /// Validate `csrf_secret` against the refresh token's secret *before*
    /// any access-token handling, then verify as usual. Returns the CSRF
    /// secret that is current after the call (rotation mints a new one).
    ///
    /// The ordering matters: checking the access token first would let a
    /// valid-but-expired access token rotate the CSRF secret before the
    /// caller's supplied secret was compared against the old one.
    async fn verify_authorization_check_csrf(
        &self,
        jar: CookieJar,
        csrf_secret: &str,
    ) -> (CookieJar, Result<(AccessToken, String), VerifyError>);
}

/// Configuration for [`AuthClient`], initialized once at startup.
pub struct ClientConfig {
    /// The auth server's P-256 public key.
    pub verification_key: p256::PublicKey,
    /// Expected `iss` claim.
    pub issuer_domain: String,
    /// This application's audience identifier.
    pub audience: String,
    /// Base URL of the auth server, e.g. `https://auth.example.com`.
    pub auth_base_url: String,
    /// Set `Secure` on written cookies. Relaxing this is for plain-http test
    /// setups only and is loudly logged.
    pub cookie_secure: bool,
    /// Bound on the outbound refresh call.
    pub refresh_timeout: Duration,
}

impl ClientConfig {
    pub fn new(
        verification_key: p256::PublicKey,
        issuer_domain: impl Into<String>,
        audience: impl Into<String>,
        auth_base_url: impl Into<String>,
    ) -> Self {
        ClientConfig {
            verification_key,
            issuer_domain: issuer_domain.into(),
            audience: audience.into(),
            auth_base_url: auth_base_url.into(),
            cookie_secure: true,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
}

/// Outcome of reading one token cookie.
enum CookieTokenError {
    Absent,
    Token(TokenError),
}

impl CookieTokenError {
    /// Only an absent or expired token may trigger a refresh.
    fn is_refreshable(&self) -> bool {
        match self {
            CookieTokenError::Absent => true,
            CookieTokenError::Token(e) => e.is_expired(),
        }
    }
}

/// The production [`Verifier`]: validates against the configured public key
/// and refreshes over HTTP.
pub struct AuthClient {
    validator: TokenClient,
    auth_base_url: String,
    cookie_secure: bool,
    http: reqwest::Client,
}

impl AuthClient {
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        if !config.cookie_secure {
            tracing::warn!(
                "cookie_secure is DISABLED; token cookies will be sent over plain http. \
                 Never run this configuration outside local testing."
            );
        }
        let http = reqwest::Client::builder()
            .timeout(config.refresh_timeout)
            .build()?;
        Ok(AuthClient {
            validator: TokenClient::new(
                config.verification_key,
                config.issuer_domain,
                config.audience,
            ),
            auth_base_url: config.auth_base_url,
            cookie_secure: config.cookie_secure,
            http,
        })
    }

    pub fn validator(&self) -> &TokenClient {
        &self.validator
    }

    /// Exchange an encoded refresh token at the auth server's refresh
    /// endpoint for a decoded, validated (access, refresh) pair.
    ///
    /// [`Verifier::verify_authorization`] invokes this automatically; it is
    /// public so applications can compose custom refresh flows.
    pub async fn refresh_tokens(
        &self,
        encoded_refresh_token: &str,
    ) -> Result<(AccessToken, RefreshToken), VerifyError> {
        let url = format!(
            "{}/api/refresh",
            self.auth_base_url.trim_end_matches('/')
        );
        tracing::debug!(%url, "posting refresh token");

        let response = self
            .http
            .post(&url)
            .json(&RefreshRequest {
                refresh_token: encoded_refresh_token,
            })
            .send()
            .await
            .map_err(|e| VerifyError::NetworkRefresh(format!("failed to post refresh: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VerifyError::NetworkRefresh(format!(
                "refresh endpoint returned {status}"
            )));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| VerifyError::NetworkRefresh(format!("invalid refresh response: {e}")))?;

        let access_token = AccessToken::decode(&body.access_token, &self.validator)
            .map_err(|e| VerifyError::NetworkRefresh(format!("invalid access token: {e}")))?;
        let refresh_token = RefreshToken::decode(&body.refresh_token, &self.validator)
            .map_err(|e| VerifyError::NetworkRefresh(format!("invalid refresh token: {e}")))?;

        Ok((access_token, refresh_token))
    }

    /// Drive the authorization-code flow: exchange the `auth_code` query
    /// parameter for tokens, set cookies, and bounce to `/`. Register this
    /// on the path given to the auth server as the service's redirect URL.
    pub async fn handle_authorization_code(
        &self,
        jar: CookieJar,
        query: &AuthCodeQuery,
    ) -> (CookieJar, Redirect) {
        let Some(code) = query.auth_code.as_deref() else {
            tracing::error!("handle authorization code: missing 'auth_code' query param");
            return (jar, Redirect::to("/"));
        };

        match self.refresh_tokens(code).await {
            Ok((access_token, refresh_token)) => {
                let jar = cookies::set_token_cookies(
                    jar,
                    &access_token,
                    &refresh_token,
                    self.cookie_secure,
                );
                (jar, Redirect::to("/"))
            }
            Err(e) => {
                tracing::error!(error = %e, "handle authorization code: exchange failed");
                (jar, Redirect::to("/"))
            }
        }
    }

    fn read_access_token(&self, jar: &CookieJar) -> Result<AccessToken, CookieTokenError> {
        let cookie = jar
            .get(cookies::ACCESS_TOKEN_COOKIE)
            .ok_or(CookieTokenError::Absent)?;
        AccessToken::decode(cookie.value(), &self.validator).map_err(CookieTokenError::Token)
    }

    fn read_refresh_token(&self, jar: &CookieJar) -> Result<RefreshToken, CookieTokenError> {
        let cookie = jar
            .get(cookies::REFRESH_TOKEN_COOKIE)
            .ok_or(CookieTokenError::Absent)?;
        RefreshToken::decode(cookie.value(), &self.validator).map_err(CookieTokenError::Token)
    }
}

/// Query parameters of the authorization-code redirect.
#[derive(Debug, Deserialize)]
pub struct AuthCodeQuery {
    pub auth_code: Option<String>,
}

#[async_trait]
impl Verifier for AuthClient {
    async fn verify_authorization(
        &self,
        jar: CookieJar,
    ) -> (CookieJar, Result<AccessToken, VerifyError>) {
        match self.read_access_token(&jar) {
            Ok(access_token) => return (jar, Ok(access_token)),
            Err(e) if !e.is_refreshable() => return (jar, Err(VerifyError::TokenInvalid)),
            Err(_) => {}
        }

        let refresh_token = match self.read_refresh_token(&jar) {
            Ok(token) => token,
            Err(CookieTokenError::Absent) => return (jar, Err(VerifyError::TokenAbsent)),
            Err(CookieTokenError::Token(e)) => {
                tracing::debug!(error = %e, "failed to validate refresh token");
                return (jar, Err(VerifyError::TokenInvalid));
            }
        };

        match self.refresh_tokens(refresh_token.encoded()).await {
            Ok((access_token, new_refresh_token)) => {
                let jar = cookies::set_token_cookies(
                    jar,
                    &access_token,
                    &new_refresh_token,
                    self.cookie_secure,
                );
                (jar, Ok(access_token))
            }
            Err(e) => {
                tracing::debug!(error = %e, "couldn't exchange refresh token");
                (jar, Err(e))
            }
        }
    }

    async fn verify_authorization_get_csrf(
        &self,
        jar: CookieJar,
    ) -> (CookieJar, Result<(AccessToken, String), VerifyError>) {
        let (jar, result) = self.verify_authorization(jar).await;
        let access_token = match result {
            Ok(token) => token,
            Err(e) => return (jar, Err(e)),
        };

        // Re-read the refresh cookie: a refresh above rotated the secret.
        match self.read_refresh_token(&jar) {
            Ok(refresh_token) => {
                let secret = refresh_token.secret().to_owned();
                (jar, Ok((access_token, secret)))
            }
            Err(CookieTokenError::Absent) => (jar, Err(VerifyError::TokenAbsent)),
            Err(CookieTokenError::Token(_)) => (jar, Err(VerifyError::TokenInvalid)),
        }
    }

    async fn verify_authorization_check_csrf(
        &self,
        jar: CookieJar,
        csrf_secret: &str,
    ) -> (CookieJar, Result<(AccessToken, String), VerifyError>) {
        let refresh_token = match self.read_refresh_token(&jar) {
            Ok(token) => token,
            Err(CookieTokenError::Absent) => return (jar, Err(VerifyError::TokenAbsent)),
            Err(CookieTokenError::Token(_)) => return (jar, Err(VerifyError::TokenInvalid)),
        };

        if !constant_time_eq(csrf_secret, refresh_token.secret()) {
            return (jar, Err(VerifyError::CsrfInvalid));
        }

        match self.read_access_token(&jar) {
            Ok(access_token) => {
                let secret = refresh_token.secret().to_owned();
                return (jar, Ok((access_token, secret)));
            }
            Err(e) if !e.is_refreshable() => return (jar, Err(VerifyError::TokenInvalid)),
            Err(_) => {}
        }

        match self.refresh_tokens(refresh_token.encoded()).await {
            Ok((access_token, new_refresh_token)) => {
                let new_secret = new_refresh_token.secret().to_owned();
                let jar = cookies::set_token_cookies(
                    jar,
                    &access_token,
                    &new_refresh_token,
                    self.cookie_secure,
                );
                (jar, Ok((access_token, new_secret)))
            }
            Err(e) => (jar, Err(e)),
        }
    }
}

pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
