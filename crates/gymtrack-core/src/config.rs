//! Application configuration management.
//!
//! Configuration is stored at `~/.config/gymtrack/config.json`. Every field
//! has a default, so a missing file means a stock setup pointed at a local
//! backend. `GYMTRACK_API_URL` and `GYMTRACK_STORAGE` override the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::client::{DEFAULT_API_URL, REQUEST_TIMEOUT_SECS};
use crate::api::ApiClient;
use crate::auth::SignInPolicy;
use crate::storage::{FileStore, KeyValueStore, KeyringStore, MemoryStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "gymtrack";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_API_URL: &str = "GYMTRACK_API_URL";
const ENV_STORAGE: &str = "GYMTRACK_STORAGE";

/// Where the session's user record and token are persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// JSON file in the cache directory
    #[default]
    File,
    /// OS keychain
    Keyring,
    /// Nothing persisted; every start is signed out
    Memory,
}

impl std::str::FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageKind::File),
            "keyring" | "keychain" => Ok(StorageKind::Keyring),
            "memory" => Ok(StorageKind::Memory),
            other => Err(anyhow::anyhow!("Unknown storage kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub storage: StorageKind,
    pub sign_in_policy: SignInPolicy,
    /// Directory for daily log files; stderr only when unset
    pub log_dir: Option<PathBuf>,
    /// Offered as the default at the sign-in prompt
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            storage: StorageKind::default(),
            sign_in_policy: SignInPolicy::default(),
            log_dir: None,
            last_email: None,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        debug!(api = %config.api_base_url, storage = ?config.storage, "Config loaded");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = var(ENV_API_URL).filter(|u| !u.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(storage) = var(ENV_STORAGE) {
            self.storage = storage
                .parse()
                .with_context(|| format!("Invalid {}", ENV_STORAGE))?;
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn api_client(&self) -> Result<ApiClient> {
        ApiClient::with_timeout(
            self.api_base_url.clone(),
            Duration::from_secs(self.request_timeout_secs),
        )
        .context("Failed to create API client")
    }

    /// Storage backend selected by `storage`
    pub fn credential_backend(&self) -> Result<Box<dyn KeyValueStore>> {
        let backend: Box<dyn KeyValueStore> = match self.storage {
            StorageKind::File => Box::new(FileStore::new(self.cache_dir()?)),
            StorageKind::Keyring => Box::new(KeyringStore::new()),
            StorageKind::Memory => Box::new(MemoryStore::new()),
        };
        Ok(backend)
    }
}
