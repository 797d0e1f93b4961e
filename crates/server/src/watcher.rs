//! Debounced file watching for the service-definition directory.
//!
//! Bursts of write/create/remove events coalesce for ~500 ms before a single
//! reload swaps the catalog map.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::channel;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{Debouncer, new_debouncer};
use thiserror::Error;

use crate::catalog::ServiceCatalog;

pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to watch '{dir}': {source}")]
    Watch {
        dir: String,
        source: notify::Error,
    },
}

/// Keeps the watcher and its reload thread alive. Dropping it stops both.
pub struct CatalogWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
}

/// Watch `dir` and reload `catalog` after each quiet period.
pub fn watch_services(
    catalog: Arc<ServiceCatalog>,
    dir: PathBuf,
) -> Result<CatalogWatcher, WatchError> {
    let (tx, rx) = channel();

    let mut debouncer = new_debouncer(DEBOUNCE_WINDOW, tx).map_err(|source| WatchError::Watch {
        dir: dir.display().to_string(),
        source,
    })?;
    debouncer
        .watcher()
        .watch(&dir, RecursiveMode::NonRecursive)
        .map_err(|source| WatchError::Watch {
            dir: dir.display().to_string(),
            source,
        })?;

    std::thread::spawn(move || {
        for result in rx {
            match result {
                Ok(events) => {
                    if !events.is_empty() {
                        catalog.reload(&dir);
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "service watcher error");
                }
            }
        }
    });

    Ok(CatalogWatcher {
        _debouncer: debouncer,
    })
}
