//! Shared fixtures for the server integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tempfile::TempDir;

use consent_migration::{Migrator, MigratorTrait};
use consent_server::AppResources;
use consent_server::api;
use consent_server::app;
use consent_server::catalog::ServiceCatalog;
use consent_server::config::AppConfig;
use consent_server::service::{PasswordMode, Service};
use consent_server::store::SqlStore;
use consent_tokens::keys::generate_signing_key;
use consent_tokens::{TokenClient, TokenServer};

pub const ISSUER_DOMAIN: &str = "auth.test.example";
pub const TEST_AUDIENCE: &str = "test-aud";
pub const TEST_REDIRECT: &str = "http://localhost:8080/callback";

pub struct TestContext {
    pub resources: AppResources,
    pub store: Arc<SqlStore>,
    _services_dir: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        let store = Arc::new(
            SqlStore::connect("sqlite::memory:")
                .await
                .expect("connect in-memory sqlite"),
        );
        Migrator::up(store.connection(), None)
            .await
            .expect("run migrations");

        let services_dir = tempfile::tempdir().expect("create services dir");
        std::fs::write(
            services_dir.path().join("test-service"),
            format!(
                r#"{{"display":"Test Service","audience":"{TEST_AUDIENCE}","redirect":"{TEST_REDIRECT}"}}"#
            ),
        )
        .expect("write service definition");
        let catalog =
            Arc::new(ServiceCatalog::load(services_dir.path()).expect("load catalog"));

        let issuer = Arc::new(TokenServer::new(generate_signing_key(), ISSUER_DOMAIN));
        let service = Arc::new(Service::new(
            store.clone(),
            store.clone(),
            catalog.clone(),
            issuer.clone(),
            PasswordMode::Testing,
        ));

        let config = Arc::new(AppConfig {
            port: 9001,
            database_url: "sqlite::memory:".into(),
            issuer_domain: ISSUER_DOMAIN.into(),
            signing_key_path: "unused-in-tests".into(),
            services_dir: services_dir.path().to_path_buf(),
            refresh_sweep_interval: 0,
        });

        TestContext {
            resources: AppResources {
                config,
                service,
                catalog,
                issuer,
            },
            store,
            _services_dir: services_dir,
        }
    }

    /// The application router as served in production.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/login", get(app::login_page))
            .nest("/api", api::router())
            .with_state(self.resources.clone())
    }

    /// A validator configured the way a relying party would be.
    pub fn client_validator(&self) -> TokenClient {
        let public = p256::PublicKey::from(self.resources.issuer.verification_key());
        TokenClient::new(public, ISSUER_DOMAIN, TEST_AUDIENCE)
    }
}
