//! The consent authorization server.
//!
//! Issues ES256-signed access and refresh tokens to users who authenticate
//! against the bcrypt identity store, rotates single-use refresh tokens, and
//! resolves service names to audiences and redirect targets through a
//! file-backed catalog.

use std::sync::Arc;

use consent_tokens::TokenServer;

use crate::catalog::ServiceCatalog;
use crate::config::AppConfig;
use crate::service::Service;

pub mod api;
pub mod app;
pub mod catalog;
pub mod config;
pub mod entity;
pub mod service;
pub mod store;
pub mod watcher;

/// Shared process-wide resources, initialized before the HTTP listener
/// starts and immutable afterwards.
#[derive(Clone)]
pub struct AppResources {
    pub config: Arc<AppConfig>,
    pub service: Arc<Service>,
    pub catalog: Arc<ServiceCatalog>,
    pub issuer: Arc<TokenServer>,
}
