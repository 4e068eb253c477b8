use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::paths::{get_config_path, get_default_database_path};

/// Default port for the API server
pub const DEFAULT_API_PORT: u16 = 48373;

pub const API_KEY_ENV: &str = "TODO_SYNC_API_KEY";
pub const DATABASE_ENV: &str = "TODO_SYNC_DATABASE";

/// Which backend the running record store is opened on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database file; defaults to `<data dir>/todo-sync.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// `host:port` of an external store, probed by the status endpoint
    #[serde(default)]
    pub remote_url: Option<String>,
}

impl StorageConfig {
    pub fn resolved_database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => get_default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Gates the AI capability flag; only its presence is ever reported
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_port() -> u16 {
    DEFAULT_API_PORT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            port: default_port(),
            storage: StorageConfig::default(),
            log_dir: None,
        }
    }
}

impl Config {
    /// Load from the default config location, then apply environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config at {path:?}"))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("Invalid config at {path:?}"))?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.api_key = non_blank(config.api_key);
        config.storage.remote_url = non_blank(config.storage.remote_url);
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(key) = non_blank(env::var(API_KEY_ENV).ok()) {
            self.api_key = Some(key);
        }
        if let Some(path) = non_blank(env::var(DATABASE_ENV).ok()) {
            self.storage.database_path = Some(PathBuf::from(path));
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
