//! ES256 JSON Web Tokens for the consent authorization service.
//!
//! One ECDSA P-256 key pair is shared across all relying parties: the auth
//! server holds the private half and implements both [`Issuer`] and
//! [`Validator`] (see [`TokenServer`]); each relying party holds the public
//! half and implements only [`Validator`] with audience enforcement
//! (see [`TokenClient`]).
//!
//! Two token variants exist: [`AccessToken`] (short-lived bearer proof) and
//! [`RefreshToken`] (long-lived, single-use, carries the session's CSRF
//! secret).

use std::time::Duration;

mod access;
mod client;
mod codec;
pub mod error;
pub mod keys;
mod refresh;
mod server;

pub use access::{AccessToken, AccessTokenClaims};
pub use client::TokenClient;
pub use codec::{JwtHeader, generate_csrf_secret};
pub use error::{KeyError, TokenError};
pub use refresh::{RefreshToken, RefreshTokenClaims};
pub use server::TokenServer;

/// The capability to mint new tokens by signing them with the private key.
/// Implemented by [`TokenServer`] only.
pub trait Issuer: Send + Sync {
    /// Sign a SHA-256 digest, returning the URL-safe-base64 encoded
    /// fixed-width (r, s) signature segment.
    fn sign_digest(&self, digest: &[u8; 32]) -> Result<String, TokenError>;

    fn issue_access_token(
        &self,
        subject: &str,
        audience: &[String],
        lifetime: Duration,
    ) -> Result<AccessToken, TokenError>;

    /// Issue a refresh token with a freshly generated CSRF secret.
    fn issue_refresh_token(
        &self,
        subject: &str,
        audience: &[String],
        lifetime: Duration,
    ) -> Result<RefreshToken, TokenError>;
}

/// The capability to verify token signatures and claims.
///
/// The server role does not enforce audience (it issues for many); the
/// client role does.
pub trait Validator: Send + Sync {
    fn should_validate_audience(&self) -> bool;

    fn validate_domain(&self, issuer_domain: &str) -> bool;

    /// Check a space-separated audience string for membership.
    fn validate_audience(&self, audience: &str) -> bool;

    fn verify_signature(
        &self,
        enc_header: &str,
        enc_claims: &str,
        enc_signature: &str,
    ) -> Result<(), TokenError>;

    /// Permitted clock drift in seconds for `iat`/`exp` checks. Zero unless
    /// explicitly configured.
    fn clock_skew(&self) -> i64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_token;
    use time::OffsetDateTime;

    const DOMAIN: &str = "auth.example.com";
    const AUDIENCE: &str = "my-app";

    fn server() -> TokenServer {
        TokenServer::new(keys::generate_signing_key(), DOMAIN)
    }

    fn client_for(server: &TokenServer, audience: &str) -> TokenClient {
        let public = p256::PublicKey::from(server.verification_key());
        TokenClient::new(public, DOMAIN, audience)
    }

    fn audiences(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn access_token_roundtrip() {
        let server = server();
        let client = client_for(&server, AUDIENCE);

        let issued = server
            .issue_access_token("alice", &audiences(&[AUDIENCE]), Duration::from_secs(1800))
            .unwrap();
        let decoded = AccessToken::decode(issued.encoded(), &client).unwrap();

        assert_eq!(decoded.subject(), "alice");
        assert_eq!(decoded.issuer(), DOMAIN);
        assert_eq!(decoded.audience(), issued.audience());
        assert_eq!(decoded.encoded(), issued.encoded());
    }

    #[test]
    fn refresh_token_roundtrip_preserves_secret() {
        let server = server();
        let client = client_for(&server, AUDIENCE);

        let issued = server
            .issue_refresh_token("alice", &audiences(&[AUDIENCE]), Duration::from_secs(3600))
            .unwrap();
        let decoded = RefreshToken::decode(issued.encoded(), &client).unwrap();

        assert_eq!(decoded.secret(), issued.secret());
        assert_eq!(decoded.secret().len(), 43);
        assert_eq!(decoded.subject(), "alice");
    }

    #[test]
    fn many_roundtrips_survive_leading_zero_signatures() {
        // A leading zero byte in r or s shows up in roughly 1/128 of
        // signatures; 512 iterations make one overwhelmingly likely.
        let server = server();
        let client = client_for(&server, AUDIENCE);
        for i in 0..512 {
            let subject = format!("user-{i}");
            let issued = server
                .issue_access_token(&subject, &audiences(&[AUDIENCE]), Duration::from_secs(60))
                .unwrap();
            let decoded = AccessToken::decode(issued.encoded(), &client).unwrap();
            assert_eq!(decoded.subject(), subject);
        }
    }

    #[test]
    fn wrong_key_is_rejected() {
        let issuing = server();
        let other = server();
        let client = client_for(&other, AUDIENCE);

        let issued = issuing
            .issue_access_token("alice", &audiences(&[AUDIENCE]), Duration::from_secs(60))
            .unwrap();
        let err = AccessToken::decode(issued.encoded(), &client).unwrap_err();
        assert!(matches!(err, TokenError::BadSignature(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let server = server();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = AccessTokenClaims {
            expiration: now - 60,
            issued_at: now - 120,
            issuer: DOMAIN.into(),
            audience: AUDIENCE.into(),
            subject: "alice".into(),
        };
        let encoded = encode_token(&claims, &server).unwrap();
        let client = client_for(&server, AUDIENCE);
        assert!(matches!(
            AccessToken::decode(&encoded, &client).unwrap_err(),
            TokenError::Expired
        ));
    }

    #[test]
    fn future_issued_at_is_rejected() {
        let server = server();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = AccessTokenClaims {
            expiration: now + 600,
            issued_at: now + 300,
            issuer: DOMAIN.into(),
            audience: AUDIENCE.into(),
            subject: "alice".into(),
        };
        let encoded = encode_token(&claims, &server).unwrap();
        let client = client_for(&server, AUDIENCE);
        assert!(matches!(
            AccessToken::decode(&encoded, &client).unwrap_err(),
            TokenError::NotIssued
        ));
    }

    #[test]
    fn clock_skew_tolerates_recent_expiry() {
        let server = server();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = AccessTokenClaims {
            expiration: now - 30,
            issued_at: now - 600,
            issuer: DOMAIN.into(),
            audience: AUDIENCE.into(),
            subject: "alice".into(),
        };
        let encoded = encode_token(&claims, &server).unwrap();

        let strict = client_for(&server, AUDIENCE);
        assert!(matches!(
            AccessToken::decode(&encoded, &strict).unwrap_err(),
            TokenError::Expired
        ));

        let lenient = client_for(&server, AUDIENCE).with_clock_skew(Duration::from_secs(60));
        assert!(AccessToken::decode(&encoded, &lenient).is_ok());
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let server = server();
        let issued = server
            .issue_access_token("alice", &audiences(&[AUDIENCE]), Duration::from_secs(60))
            .unwrap();

        let public = p256::PublicKey::from(server.verification_key());
        let client = TokenClient::new(public, "other.example.com", AUDIENCE);
        assert!(matches!(
            AccessToken::decode(issued.encoded(), &client).unwrap_err(),
            TokenError::InvalidIssuer
        ));
    }

    #[test]
    fn wrong_audience_rejected_by_client_but_not_server() {
        let server = server();
        let issued = server
            .issue_access_token("alice", &audiences(&["other-aud"]), Duration::from_secs(60))
            .unwrap();

        let client = client_for(&server, "my-app");
        assert!(matches!(
            AccessToken::decode(issued.encoded(), &client).unwrap_err(),
            TokenError::InvalidAudience
        ));

        // The server validator accepts any audience it issued for.
        assert!(AccessToken::decode(issued.encoded(), &server).is_ok());
    }

    #[test]
    fn audience_membership_is_space_separated() {
        let server = server();
        let issued = server
            .issue_access_token(
                "alice",
                &audiences(&["first-app", "my-app", "last-app"]),
                Duration::from_secs(60),
            )
            .unwrap();

        let member = client_for(&server, "my-app");
        assert!(AccessToken::decode(issued.encoded(), &member).is_ok());

        // Substring of a listed audience is not membership.
        let substring = client_for(&server, "my");
        assert!(matches!(
            AccessToken::decode(issued.encoded(), &substring).unwrap_err(),
            TokenError::InvalidAudience
        ));
    }

    #[test]
    fn structurally_malformed_tokens_are_rejected() {
        let server = server();
        let client = client_for(&server, AUDIENCE);

        for token in [
            "",
            "only-one-part",
            "two.parts",
            "four.whole.parts.here",
            "!!!.???.###",
            "bm90LWpzb24.bm90LWpzb24.bm90LWpzb24",
        ] {
            let err = AccessToken::decode(token, &client).unwrap_err();
            assert!(
                matches!(err, TokenError::Malformed(_)),
                "expected Malformed for {token:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn foreign_header_is_rejected() {
        // A syntactically valid token whose header claims HS256.
        let server = server();
        let client = client_for(&server, AUDIENCE);
        let issued = server
            .issue_access_token("alice", &audiences(&[AUDIENCE]), Duration::from_secs(60))
            .unwrap();

        let mut parts: Vec<&str> = issued.encoded().split('.').collect();
        let forged_header = {
            use base64::Engine;
            base64::engine::general_purpose::URL_SAFE_NO_PAD
                .encode(br#"{"alg":"HS256","typ":"JWT"}"#)
        };
        parts[0] = &forged_header;
        let forged = parts.join(".");

        assert!(matches!(
            AccessToken::decode(&forged, &client).unwrap_err(),
            TokenError::BadSignature(_)
        ));
    }

    #[test]
    fn tampered_claims_fail_verification() {
        let server = server();
        let client = client_for(&server, AUDIENCE);
        let issued = server
            .issue_access_token("alice", &audiences(&[AUDIENCE]), Duration::from_secs(60))
            .unwrap();

        let now = OffsetDateTime::now_utc().unix_timestamp();
        let forged_claims = {
            use base64::Engine;
            let claims = AccessTokenClaims {
                expiration: now + 60,
                issued_at: now,
                issuer: DOMAIN.into(),
                audience: AUDIENCE.into(),
                subject: "mallory".into(),
            };
            base64::engine::general_purpose::URL_SAFE_NO_PAD
                .encode(serde_json::to_vec(&claims).unwrap())
        };

        let mut parts: Vec<&str> = issued.encoded().split('.').collect();
        parts[1] = &forged_claims;
        let forged = parts.join(".");

        assert!(matches!(
            AccessToken::decode(&forged, &client).unwrap_err(),
            TokenError::BadSignature(_)
        ));
    }
}
