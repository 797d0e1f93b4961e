//! Business logic for the consent identity server: authentication,
//! registration, and refresh-token rotation.

use std::sync::Arc;

use thiserror::Error;

use consent_tokens::TokenServer;

use crate::catalog::ServiceCatalog;
use crate::store::{IdentityStore, RefreshStore};

mod auth;
mod refresh;
mod registration;

/// Token lifetimes used by the service layer.
pub mod lifetimes {
    use std::time::Duration;

    /// The "authorization code" grant: a refresh token consumed within
    /// seconds by the relying party's redirect handler.
    pub const AUTH_CODE: Duration = Duration::from_secs(10);
    /// Access tokens minted by the refresh endpoint.
    pub const ACCESS: Duration = Duration::from_secs(30 * 60);
    /// Rotated refresh tokens minted by the refresh endpoint.
    pub const REFRESH: Duration = Duration::from_secs(72 * 60 * 60);
}

/// The error vocabulary shared by the service layer and the HTTP adapters.
/// The API layer maps these onto status codes.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account not found")]
    AccountNotFound,
    #[error("service not found: {0}")]
    ServiceNotFound(String),
    #[error("token invalid: {0}")]
    TokenInvalid(String),
    #[error("token not found")]
    TokenNotFound,
    #[error("invalid handle")]
    InvalidHandle,
    #[error("handle already exists")]
    HandleExists,
    #[error("internal error: {0}")]
    Internal(String),
}

/// Controls bcrypt cost for password hashing. Production cost everywhere
/// except tests, which would otherwise spend most of their wall clock in
/// bcrypt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PasswordMode {
    #[default]
    Production,
    /// bcrypt MIN_COST. Never use outside tests.
    Testing,
}

impl PasswordMode {
    pub fn cost(self) -> u32 {
        match self {
            PasswordMode::Production => bcrypt::DEFAULT_COST,
            PasswordMode::Testing => {
                tracing::warn!("using insecure password hashing (testing mode)");
                4 // bcrypt::MIN_COST is private; value per bcrypt crate source
            }
        }
    }
}

/// Coordinates authentication, registration, and token operations over the
/// storage traits, the catalog, and the token issuer.
pub struct Service {
    identities: Arc<dyn IdentityStore>,
    refreshes: Arc<dyn RefreshStore>,
    catalog: Arc<ServiceCatalog>,
    issuer: Arc<TokenServer>,
    password_mode: PasswordMode,
}

impl Service {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        refreshes: Arc<dyn RefreshStore>,
        catalog: Arc<ServiceCatalog>,
        issuer: Arc<TokenServer>,
        password_mode: PasswordMode,
    ) -> Self {
        Service {
            identities,
            refreshes,
            catalog,
            issuer,
            password_mode,
        }
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    pub fn issuer(&self) -> &TokenServer {
        &self.issuer
    }
}
