use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, StorageBackend};
use crate::storage::{DataManager, DatabaseDetector, RecordStore};

/// Shared handler state, cloned into every request
#[derive(Clone)]
pub struct AppState {
    pub manager: DataManager,
    pub detector: Arc<DatabaseDetector>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire handlers to an already opened store
    pub fn new(store: Arc<RecordStore>, config: Config) -> Result<Self> {
        let database_path = config.storage.resolved_database_path()?;
        let detector = DatabaseDetector::new(
            Arc::clone(&store),
            database_path,
            config.storage.remote_url.clone(),
        );

        Ok(Self {
            manager: DataManager::new(store),
            detector: Arc::new(detector),
            config: Arc::new(config),
        })
    }

    /// Open the store selected by `config.storage.backend`
    pub fn from_config(config: Config) -> Result<Self> {
        let store = match config.storage.backend {
            StorageBackend::Sqlite => {
                let path = config.storage.resolved_database_path()?;
                info!("Using SQLite record store at {:?}", path);
                RecordStore::open(&path)
                    .with_context(|| format!("Failed to open database at {path:?}"))?
            }
            StorageBackend::Memory => {
                info!("Using in-memory record store");
                RecordStore::open_in_memory().context("Failed to open in-memory database")?
            }
        };

        Self::new(Arc::new(store), config)
    }
}
