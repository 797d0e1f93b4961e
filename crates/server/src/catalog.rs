//! The service catalog: maps a service name to its display string, audience,
//! and redirect URL.
//!
//! Definitions are JSON files in a directory; the file name is the service
//! name. The strict loader ([`ServiceCatalog::load`]) fails on any invalid
//! definition and is used at startup; the lenient reload used by the file
//! watcher logs and skips bad files instead.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read services directory '{dir}': {source}")]
    ReadDir {
        dir: String,
        source: std::io::Error,
    },
    #[error("failed to load service '{name}': {reason}")]
    Definition { name: String, reason: String },
}

/// One service definition. The redirect URL is parsed at load time;
/// unparseable definitions never enter the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceDefinition {
    pub display: String,
    pub audience: String,
    pub redirect: Url,
}

/// Thread-safe name → definition map. Request handlers read it; the file
/// watcher replaces the whole map in one swap, so readers always observe a
/// complete catalog.
#[derive(Debug)]
pub struct ServiceCatalog {
    services: RwLock<HashMap<String, ServiceDefinition>>,
}

impl ServiceCatalog {
    /// Load all definitions from `dir`, failing on the first invalid one.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let services = load_dir_strict(dir.as_ref())?;
        tracing::info!(
            count = services.len(),
            dir = %dir.as_ref().display(),
            "loaded service definitions"
        );
        Ok(ServiceCatalog {
            services: RwLock::new(services),
        })
    }

    /// An empty catalog; definitions arrive via [`ServiceCatalog::reload`].
    pub fn empty() -> Self {
        ServiceCatalog {
            services: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, name: &str) -> Option<ServiceDefinition> {
        self.services
            .read()
            .expect("catalog lock poisoned")
            .get(name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.services.read().expect("catalog lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-read `dir` leniently and swap the map atomically. Invalid
    /// definitions are logged and skipped; a directory read failure leaves
    /// the current catalog in place.
    pub fn reload(&self, dir: impl AsRef<Path>) {
        let dir = dir.as_ref();
        let services = match load_dir_lenient(dir) {
            Ok(services) => services,
            Err(e) => {
                tracing::error!(dir = %dir.display(), error = %e, "catalog reload failed");
                return;
            }
        };
        tracing::info!(
            count = services.len(),
            dir = %dir.display(),
            "reloaded service definitions"
        );
        *self.services.write().expect("catalog lock poisoned") = services;
    }
}

fn load_definition(path: &Path) -> Result<ServiceDefinition, String> {
    let raw = fs::read(path).map_err(|e| format!("failed to read definition: {e}"))?;
    serde_json::from_slice(&raw).map_err(|e| format!("failed to parse json: {e}"))
}

fn read_definition_files(dir: &Path) -> Result<Vec<(String, std::path::PathBuf)>, CatalogError> {
    let entries = fs::read_dir(dir).map_err(|source| CatalogError::ReadDir {
        dir: dir.display().to_string(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| CatalogError::ReadDir {
            dir: dir.display().to_string(),
            source,
        })?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        files.push((name, entry.path()));
    }
    Ok(files)
}

fn load_dir_strict(dir: &Path) -> Result<HashMap<String, ServiceDefinition>, CatalogError> {
    let mut services = HashMap::new();
    for (name, path) in read_definition_files(dir)? {
        let definition =
            load_definition(&path).map_err(|reason| CatalogError::Definition {
                name: name.clone(),
                reason,
            })?;
        services.insert(name, definition);
    }
    Ok(services)
}

fn load_dir_lenient(dir: &Path) -> Result<HashMap<String, ServiceDefinition>, CatalogError> {
    let mut services = HashMap::new();
    for (name, path) in read_definition_files(dir)? {
        match load_definition(&path) {
            Ok(definition) => {
                services.insert(name, definition);
            }
            Err(reason) => {
                tracing::warn!(service = %name, %reason, "skipping invalid service definition");
            }
        }
    }
    Ok(services)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_definition(dir: &Path, name: &str, json: &str) {
        let mut file = fs::File::create(dir.join(name)).unwrap();
        file.write_all(json.as_bytes()).unwrap();
    }

    #[test]
    fn strict_load_reads_valid_definitions() {
        let dir = tempfile::tempdir().unwrap();
        write_definition(
            dir.path(),
            "test-service",
            r#"{"display":"Test","audience":"test-aud","redirect":"http://app.example.com/cb"}"#,
        );

        let catalog = ServiceCatalog::load(dir.path()).unwrap();
        let definition = catalog.get("test-service").unwrap();
        assert_eq!(definition.display, "Test");
        assert_eq!(definition.audience, "test-aud");
        assert_eq!(definition.redirect.as_str(), "http://app.example.com/cb");
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn strict_load_fails_on_bad_redirect() {
        let dir = tempfile::tempdir().unwrap();
        write_definition(
            dir.path(),
            "broken",
            r#"{"display":"Broken","audience":"a","redirect":"not a url"}"#,
        );

        let err = ServiceCatalog::load(dir.path()).unwrap_err();
        assert!(matches!(err, CatalogError::Definition { name, .. } if name == "broken"));
    }

    #[test]
    fn strict_load_fails_on_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        write_definition(dir.path(), "broken", "{not json");
        assert!(ServiceCatalog::load(dir.path()).is_err());
    }

    #[test]
    fn lenient_reload_skips_bad_definitions() {
        let dir = tempfile::tempdir().unwrap();
        write_definition(
            dir.path(),
            "good",
            r#"{"display":"Good","audience":"good-aud","redirect":"http://good.example.com/"}"#,
        );
        write_definition(dir.path(), "bad", "{not json");

        let catalog = ServiceCatalog::empty();
        catalog.reload(dir.path());
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("good").is_some());
        assert!(catalog.get("bad").is_none());
    }

    #[test]
    fn reload_replaces_removed_definitions() {
        let dir = tempfile::tempdir().unwrap();
        write_definition(
            dir.path(),
            "first",
            r#"{"display":"First","audience":"a","redirect":"http://a.example.com/"}"#,
        );
        let catalog = ServiceCatalog::load(dir.path()).unwrap();
        assert!(catalog.get("first").is_some());

        fs::remove_file(dir.path().join("first")).unwrap();
        write_definition(
            dir.path(),
            "second",
            r#"{"display":"Second","audience":"b","redirect":"http://b.example.com/"}"#,
        );
        catalog.reload(dir.path());
        assert!(catalog.get("first").is_none());
        assert!(catalog.get("second").is_some());
    }
}
