//! gymtrack core - session management, credential storage and the API client
//! for the gymtrack fitness tracker.
//!
//! The central piece is [`auth::SessionManager`]: it restores a stored
//! session on start, signs users in and out, and keeps the API client's
//! bearer header in step with the signed-in user.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod storage;

pub use api::{ApiClient, ApiError, AuthApi};
pub use auth::{SessionError, SessionManager, SessionSnapshot, SessionStatus, SignInPolicy};
pub use config::{Config, StorageKind};
pub use models::{Exercise, User};
pub use storage::{CredentialStore, FileStore, KeyValueStore, KeyringStore, MemoryStore, StorageError};
