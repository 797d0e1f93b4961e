use std::sync::Arc;

use consent_migration::{Migrator, MigratorTrait};
use consent_server::api::start_webserver;
use consent_server::catalog::ServiceCatalog;
use consent_server::config::load_config;
use consent_server::service::{PasswordMode, Service};
use consent_server::store::{RefreshStore, SqlStore};
use consent_server::watcher::watch_services;
use consent_server::AppResources;
use consent_tokens::TokenServer;
use consent_tokens::keys::read_signing_key;
use tokio::time::{Duration, interval};

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".parse().expect("static filter parses")),
        )
        .init();

    // Load config
    let config = Arc::new(load_config()?);

    // Load the signing key and stand up the issuer/validator
    let signing_key = read_signing_key(&config.signing_key_path)?;
    let issuer = Arc::new(TokenServer::new(signing_key, &config.issuer_domain));

    // Connect storage and bring the schema up to date
    let store = Arc::new(SqlStore::connect(&config.database_url).await?);
    Migrator::up(store.connection(), None).await?;

    // Load the service catalog and keep it fresh
    let catalog = Arc::new(ServiceCatalog::load(&config.services_dir)?);
    let _watcher = watch_services(catalog.clone(), config.services_dir.clone())?;

    let service = Arc::new(Service::new(
        store.clone(),
        store.clone(),
        catalog.clone(),
        issuer.clone(),
        PasswordMode::Production,
    ));

    // Periodically sweep expired refresh rows
    if config.refresh_sweep_interval > 0 {
        let sweep_store: Arc<dyn RefreshStore> = store.clone();
        let mut sweep_interval = interval(Duration::from_secs(config.refresh_sweep_interval));
        tokio::spawn(async move {
            loop {
                sweep_interval.tick().await;
                let now = time::OffsetDateTime::now_utc().unix_timestamp();
                match sweep_store.delete_expired(now).await {
                    Ok(0) => {}
                    Ok(count) => tracing::info!(count, "swept expired refresh tokens"),
                    Err(e) => tracing::error!(error = %e, "expiry sweep failed"),
                }
            }
        });
    }

    let resources = AppResources {
        config,
        service,
        catalog,
        issuer,
    };

    start_webserver(resources).await
}
