//! Login: credential check, auth-code issuance, and redirect construction.

use std::sync::LazyLock;

use consent_tokens::Issuer;
use url::Url;

use super::{Service, ServiceError, lifetimes};
use crate::store::StoreError;

/// A real hash to compare against when the handle is unknown, so that the
/// lookup-miss path costs the same as a wrong password.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    bcrypt::hash("consent-dummy-password", bcrypt::DEFAULT_COST)
        .expect("bcrypt hash of static input")
});

impl Service {
    /// Authenticate `handle` against the identity store and issue the
    /// short-lived auth-code refresh token for `service_name`.
    ///
    /// Returns the service's redirect URL with the `auth_code` query
    /// parameter set to the encoded token.
    pub async fn login(
        &self,
        handle: &str,
        secret: &str,
        service_name: &str,
    ) -> Result<Url, ServiceError> {
        let hash = match self.identities.get_secret(handle).await {
            Ok(hash) => hash,
            Err(StoreError::NotFound) => {
                // Burn a bcrypt compare anyway; see DUMMY_HASH.
                let _ = bcrypt::verify(secret, &DUMMY_HASH);
                return Err(ServiceError::AccountNotFound);
            }
            Err(e) => {
                return Err(ServiceError::Internal(format!(
                    "failed to retrieve secret: {e}"
                )));
            }
        };

        let hash = String::from_utf8(hash)
            .map_err(|e| ServiceError::Internal(format!("stored hash is not utf-8: {e}")))?;
        let verified = bcrypt::verify(secret, &hash)
            .map_err(|e| ServiceError::Internal(format!("bcrypt verify: {e}")))?;
        if !verified {
            return Err(ServiceError::InvalidCredentials);
        }

        let definition = self
            .catalog
            .get(service_name)
            .ok_or_else(|| ServiceError::ServiceNotFound(service_name.to_owned()))?;

        let refresh_token = self
            .issuer
            .issue_refresh_token(
                handle,
                &[definition.audience.clone()],
                lifetimes::AUTH_CODE,
            )
            .map_err(|e| ServiceError::Internal(format!("failed to issue refresh token: {e}")))?;

        self.refreshes
            .insert_refresh_token(&refresh_token)
            .await
            .map_err(|e| ServiceError::Internal(format!("failed to store refresh token: {e}")))?;

        Ok(build_redirect_url(
            &definition.redirect,
            refresh_token.encoded(),
        ))
    }
}

/// Clone `redirect` and set its `auth_code` query parameter to the encoded
/// refresh token, replacing any existing value.
fn build_redirect_url(redirect: &Url, refresh_token: &str) -> Url {
    let mut url = redirect.clone();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "auth_code")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (key, value) in &kept {
            pairs.append_pair(key, value);
        }
        pairs.append_pair("auth_code", refresh_token);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_url_gains_auth_code() {
        let redirect = Url::parse("http://app.example.com/callback").unwrap();
        let url = build_redirect_url(&redirect, "tok");
        assert_eq!(url.as_str(), "http://app.example.com/callback?auth_code=tok");
    }

    #[test]
    fn redirect_url_keeps_other_params_and_replaces_auth_code() {
        let redirect =
            Url::parse("http://app.example.com/callback?theme=dark&auth_code=stale").unwrap();
        let url = build_redirect_url(&redirect, "fresh");
        assert_eq!(
            url.as_str(),
            "http://app.example.com/callback?theme=dark&auth_code=fresh"
        );
    }
}
