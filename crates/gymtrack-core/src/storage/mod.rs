//! Durable key-value storage for the signed-in user and their token.
//!
//! This module provides:
//! - `KeyValueStore`: the get/set/remove contract every backend implements
//! - `MemoryStore`, `FileStore`, `KeyringStore`: concrete backends
//! - `CredentialStore`: typed user and token slots on top of any backend

pub mod backend;
pub mod credentials;
pub mod error;
pub mod file;
pub mod keychain;

pub use backend::{KeyValueStore, MemoryStore};
pub use credentials::{CredentialStore, AUTH_TOKEN_STORAGE, USER_STORAGE};
pub use error::StorageError;
pub use file::FileStore;
pub use keychain::KeyringStore;
