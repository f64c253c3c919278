use async_trait::async_trait;
use keyring::Entry;

use super::{KeyValueStore, StorageError};

const SERVICE_NAME: &str = "gymtrack";

/// One OS keychain entry per key, under the `gymtrack` service.
///
/// Keychain calls block (D-Bus, Security.framework, Credential Manager), so
/// every operation runs on tokio's blocking pool.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Run `op` against the entry for `key` on the blocking pool.
    async fn with_entry<T, F>(&self, key: &str, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Entry) -> keyring::Result<T> + Send + 'static,
    {
        let service = self.service.clone();
        let owned_key = key.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let entry = Entry::new(&service, &owned_key)?;
            op(&entry)
        })
        .await
        .map_err(|source| StorageError::Blocking {
            key: key.to_string(),
            source,
        })?;

        result.map_err(|source| StorageError::Keyring {
            key: key.to_string(),
            source,
        })
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for KeyringStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_entry(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let value = value.to_string();
        self.with_entry(key, move |entry| entry.set_password(&value))
            .await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.with_entry(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        })
        .await
    }
}
