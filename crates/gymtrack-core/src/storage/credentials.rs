use tracing::debug;

use super::{KeyValueStore, StorageError};
use crate::models::User;

/// Storage key for the serialized user record
pub const USER_STORAGE: &str = "@gymtrack:user";

/// Storage key for the raw bearer token
pub const AUTH_TOKEN_STORAGE: &str = "@gymtrack:token";

/// Typed user and token slots over a key-value backend.
///
/// The two slots are independent here; keeping them in step is the
/// session manager's job.
pub struct CredentialStore<S> {
    backend: S,
}

impl<S: KeyValueStore> CredentialStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub async fn save_user(&self, user: &User) -> Result<(), StorageError> {
        let json = serde_json::to_string(user).map_err(|source| StorageError::Serialize {
            key: USER_STORAGE.to_string(),
            source,
        })?;
        self.backend.set(USER_STORAGE, &json).await
    }

    /// Absent slot yields the empty record, matching how `{}` parses.
    pub async fn get_user(&self) -> Result<User, StorageError> {
        match self.backend.get(USER_STORAGE).await? {
            Some(json) => serde_json::from_str(&json).map_err(|source| StorageError::Corrupt {
                key: USER_STORAGE.to_string(),
                source,
            }),
            None => {
                debug!("No stored user");
                Ok(User::default())
            }
        }
    }

    pub async fn remove_user(&self) -> Result<(), StorageError> {
        self.backend.remove(USER_STORAGE).await
    }

    pub async fn save_token(&self, token: &str) -> Result<(), StorageError> {
        self.backend.set(AUTH_TOKEN_STORAGE, token).await
    }

    pub async fn get_token(&self) -> Result<Option<String>, StorageError> {
        self.backend.get(AUTH_TOKEN_STORAGE).await
    }

    pub async fn remove_token(&self) -> Result<(), StorageError> {
        self.backend.remove(AUTH_TOKEN_STORAGE).await
    }
}
