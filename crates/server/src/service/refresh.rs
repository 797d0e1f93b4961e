//! Refresh rotation and revocation.

use consent_tokens::{AccessToken, Issuer, RefreshToken};

use super::{Service, ServiceError, lifetimes};

impl Service {
    /// Consume `encoded_refresh_token` and mint a fresh (access, refresh)
    /// pair for the same subject and audiences.
    ///
    /// The delete happens before issuance: the store removes exactly one row
    /// per encoded token, so of any number of concurrent refreshes of the
    /// same token only one proceeds to mint.
    pub async fn refresh_tokens(
        &self,
        encoded_refresh_token: &str,
    ) -> Result<(AccessToken, RefreshToken), ServiceError> {
        let token = RefreshToken::decode(encoded_refresh_token, self.issuer.as_ref())
            .map_err(|e| ServiceError::TokenInvalid(format!("couldn't decode refresh token: {e}")))?;

        let deleted = self
            .refreshes
            .delete_refresh_token(encoded_refresh_token)
            .await
            .map_err(|e| {
                ServiceError::Internal(format!("refresh token couldn't be deleted: {e}"))
            })?;
        if !deleted {
            return Err(ServiceError::TokenNotFound);
        }

        let access_token = self
            .issuer
            .issue_access_token(token.subject(), token.audience(), lifetimes::ACCESS)
            .map_err(|e| ServiceError::Internal(format!("couldn't issue access token: {e}")))?;

        let refresh_token = self
            .issuer
            .issue_refresh_token(token.subject(), token.audience(), lifetimes::REFRESH)
            .map_err(|e| ServiceError::Internal(format!("couldn't issue refresh token: {e}")))?;

        self.refreshes
            .insert_refresh_token(&refresh_token)
            .await
            .map_err(|e| ServiceError::Internal(format!("failed to store refresh token: {e}")))?;

        Ok((access_token, refresh_token))
    }

    /// Delete the refresh record for `encoded_refresh_token`. No decode, no
    /// audience check: revocation is by encoded-JWT match only.
    pub async fn revoke_refresh_token(
        &self,
        encoded_refresh_token: &str,
    ) -> Result<(), ServiceError> {
        let deleted = self
            .refreshes
            .delete_refresh_token(encoded_refresh_token)
            .await
            .map_err(|e| {
                ServiceError::Internal(format!("failed to delete refresh token: {e}"))
            })?;
        if !deleted {
            return Err(ServiceError::TokenNotFound);
        }
        Ok(())
    }

    /// Delete refresh rows that expired before `now` (unix seconds).
    pub async fn sweep_expired_tokens(&self, now: i64) -> Result<u64, ServiceError> {
        self.refreshes
            .delete_expired(now)
            .await
            .map_err(|e| ServiceError::Internal(format!("expiry sweep failed: {e}")))
    }
}
