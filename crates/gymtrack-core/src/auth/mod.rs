//! Authentication module for managing the signed-in session.
//!
//! This module provides:
//! - `SessionManager`: restore, sign-in, sign-out and profile updates
//! - `SessionSnapshot`: the read-only view handed to UI consumers
//! - `SessionError`: failures, split into user-facing and unexpected
//!
//! The user record and token are persisted under two keys that are always
//! written and removed together; the API client's `Authorization` header
//! follows the in-memory session.

pub mod error;
pub mod manager;
pub mod session;

pub use error::SessionError;
pub use manager::{SessionManager, SignInPolicy};
pub use session::{SessionSnapshot, SessionStatus};
