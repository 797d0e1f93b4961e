//! Test support: issue tokens and verify authorization without a running
//! auth server.
//!
//! [`TestVerifier`] implements [`Verifier`] by minting replacement tokens
//! in-process over a shared test key instead of POSTing to the refresh
//! endpoint. It keeps no refresh store, so it does not enforce the
//! single-use invariant; tests that exercise replay should run against the
//! real server.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use p256::SecretKey;
use time::OffsetDateTime;

use consent_tokens::error::TokenError;
use consent_tokens::keys::generate_signing_key;
use consent_tokens::{AccessToken, Issuer, RefreshToken, TokenServer};

use crate::cookies::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, set_token_cookies};
use crate::{CookieTokenError, Verifier, VerifyError, constant_time_eq};

/// Default user identity for dev/test flows.
pub const DEFAULT_TEST_SUBJECT: &str = "alice";

pub const DEFAULT_ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_REFRESH_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

static SHARED_TEST_KEY: LazyLock<SecretKey> = LazyLock::new(generate_signing_key);

/// A process-shared ECDSA P-256 key, so tests skip per-test key generation.
pub fn shared_test_key() -> SecretKey {
    SHARED_TEST_KEY.clone()
}

/// Token issuing and validation for tests.
pub struct TestEnv {
    issuer: TokenServer,
    pub domain: String,
    pub audience: String,
}

impl TestEnv {
    /// A test environment over the shared key. Most tests should use this.
    pub fn new(domain: impl Into<String>, audience: impl Into<String>) -> Self {
        Self::with_key(shared_test_key(), domain, audience)
    }

    /// A test environment with a specific key, for key-mismatch scenarios.
    pub fn with_key(
        key: SecretKey,
        domain: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        let domain = domain.into();
        TestEnv {
            issuer: TokenServer::new(key, domain.clone()),
            domain,
            audience: audience.into(),
        }
    }

    /// The server role behind this environment; it validates without
    /// enforcing audience, exactly like the real auth server.
    pub fn issuer(&self) -> &TokenServer {
        &self.issuer
    }

    pub fn issue_access_token(
        &self,
        subject: &str,
        lifetime: Duration,
    ) -> Result<AccessToken, TokenError> {
        self.issuer
            .issue_access_token(subject, &[self.audience.clone()], lifetime)
    }

    pub fn issue_refresh_token(
        &self,
        subject: &str,
        lifetime: Duration,
    ) -> Result<RefreshToken, TokenError> {
        self.issuer
            .issue_refresh_token(subject, &[self.audience.clone()], lifetime)
    }

    /// An access token that is already past its expiration.
    pub fn issue_expired_access_token(&self, subject: &str) -> Result<AccessToken, TokenError> {
        let issued_at = OffsetDateTime::now_utc() - Duration::from_secs(2 * 60 * 60);
        self.issuer.issue_access_token_at(
            subject,
            &[self.audience.clone()],
            issued_at,
            DEFAULT_ACCESS_TOKEN_LIFETIME,
        )
    }

    /// A refresh token that is already past its expiration.
    pub fn issue_expired_refresh_token(&self, subject: &str) -> Result<RefreshToken, TokenError> {
        let issued_at = OffsetDateTime::now_utc() - Duration::from_secs(48 * 60 * 60);
        self.issuer.issue_refresh_token_at(
            subject,
            &[self.audience.clone()],
            issued_at,
            DEFAULT_REFRESH_TOKEN_LIFETIME,
        )
    }

    /// A request jar carrying valid access and refresh cookies for
    /// `subject`, with default lifetimes.
    pub fn authenticated_jar(&self, subject: &str) -> Result<CookieJar, TokenError> {
        let access = self.issue_access_token(subject, DEFAULT_ACCESS_TOKEN_LIFETIME)?;
        let refresh = self.issue_refresh_token(subject, DEFAULT_REFRESH_TOKEN_LIFETIME)?;
        Ok(Self::jar_with(Some(&access), Some(&refresh)))
    }

    /// Build a request jar from whichever tokens are given.
    pub fn jar_with(access: Option<&AccessToken>, refresh: Option<&RefreshToken>) -> CookieJar {
        let mut jar = CookieJar::new();
        if let Some(token) = access {
            jar = jar.add(Cookie::new(ACCESS_TOKEN_COOKIE, token.encoded().to_owned()));
        }
        if let Some(token) = refresh {
            jar = jar.add(Cookie::new(
                REFRESH_TOKEN_COOKIE,
                token.encoded().to_owned(),
            ));
        }
        jar
    }
}

/// A [`Verifier`] for tests: same contract as [`crate::AuthClient`], no
/// network. Cookies are written without the `Secure` flag so plain-http
/// test harnesses can read them back.
pub struct TestVerifier {
    env: TestEnv,
}

impl TestVerifier {
    pub fn new(domain: impl Into<String>, audience: impl Into<String>) -> Self {
        TestVerifier {
            env: TestEnv::new(domain, audience),
        }
    }

    pub fn with_env(env: TestEnv) -> Self {
        TestVerifier { env }
    }

    pub fn env(&self) -> &TestEnv {
        &self.env
    }

    fn refresh_locally(
        &self,
        old: &RefreshToken,
    ) -> Result<(AccessToken, RefreshToken), VerifyError> {
        let access = self
            .env
            .issuer
            .issue_access_token(old.subject(), old.audience(), DEFAULT_ACCESS_TOKEN_LIFETIME)
            .map_err(|e| VerifyError::NetworkRefresh(format!("local issuance failed: {e}")))?;
        let refresh = self
            .env
            .issuer
            .issue_refresh_token(old.subject(), old.audience(), DEFAULT_REFRESH_TOKEN_LIFETIME)
            .map_err(|e| VerifyError::NetworkRefresh(format!("local issuance failed: {e}")))?;
        Ok((access, refresh))
    }

    fn read_access_token(&self, jar: &CookieJar) -> Result<AccessToken, CookieTokenError> {
        let cookie = jar.get(ACCESS_TOKEN_COOKIE).ok_or(CookieTokenError::Absent)?;
        AccessToken::decode(cookie.value(), &self.env.issuer).map_err(CookieTokenError::Token)
    }

    fn read_refresh_token(&self, jar: &CookieJar) -> Result<RefreshToken, CookieTokenError> {
        let cookie = jar.get(REFRESH_TOKEN_COOKIE).ok_or(CookieTokenError::Absent)?;
        RefreshToken::decode(cookie.value(), &self.env.issuer).map_err(CookieTokenError::Token)
    }
}

#[async_trait]
impl Verifier for TestVerifier {
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
            Err(CookieTokenError::Token(_)) => return (jar, Err(VerifyError::TokenInvalid)),
        };

        match self.refresh_locally(&refresh_token) {
            Ok((access_token, new_refresh_token)) => {
                let jar = set_token_cookies(jar, &access_token, &new_refresh_token, false);
                (jar, Ok(access_token))
            }
            Err(e) => (jar, Err(e)),
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

        match self.refresh_locally(&refresh_token) {
            Ok((access_token, new_refresh_token)) => {
                let new_secret = new_refresh_token.secret().to_owned();
                let jar = set_token_cookies(jar, &access_token, &new_refresh_token, false);
                (jar, Ok((access_token, new_secret)))
            }
            Err(e) => (jar, Err(e)),
        }
    }
}
