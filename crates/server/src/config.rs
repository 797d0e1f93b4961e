use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Port the HTTP listener binds on.
    pub port: u16,
    /// SeaORM connection string, e.g. `sqlite://consent.db?mode=rwc`.
    pub database_url: String,
    /// Domain written into the `iss` claim of every issued token.
    pub issuer_domain: String,
    /// DER-encoded EC private key (SEC1 or PKCS#8).
    pub signing_key_path: PathBuf,
    /// Directory of service-definition JSON files.
    pub services_dir: PathBuf,
    /// Seconds between sweeps of expired refresh rows. 0 disables the sweep.
    #[serde(default = "default_sweep_interval")]
    pub refresh_sweep_interval: u64,
}

fn default_sweep_interval() -> u64 {
    3600
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any environment variable matching the key path separated by double
/// underscores (e.g. `DATABASE_URL`, `SERVICES__DIR` for nested keys)
/// overrides the file value.
///
/// Returns a `ConfigError` instead of panicking so the caller can decide how
/// to fail.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml"))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    validate(&app)?;
    Ok(app)
}

fn validate(app: &AppConfig) -> Result<(), ConfigError> {
    if app.port == 0 {
        return Err(ConfigError::Validation("port must be > 0".into()));
    }
    if app.issuer_domain.trim().is_empty() {
        return Err(ConfigError::Validation(
            "issuer_domain must not be empty".into(),
        ));
    }
    if app.database_url.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database_url must not be empty".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            port: 9001,
            database_url: "sqlite::memory:".into(),
            issuer_domain: "auth.example.com".into(),
            signing_key_path: "/etc/consent/signing_key.der".into(),
            services_dir: "/etc/consent/services".into(),
            refresh_sweep_interval: 3600,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn zero_port_rejected() {
        let mut cfg = base_config();
        cfg.port = 0;
        assert!(matches!(
            validate(&cfg).unwrap_err(),
            ConfigError::Validation(_)
        ));
    }

    #[test]
    fn blank_issuer_rejected() {
        let mut cfg = base_config();
        cfg.issuer_domain = "  ".into();
        assert!(validate(&cfg).is_err());
    }
}
