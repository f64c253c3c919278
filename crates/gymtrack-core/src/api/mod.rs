//! REST API client module for the gymtrack backend.
//!
//! This module provides the `ApiClient` for communicating with the API,
//! and the `AuthApi` seam the session manager signs in through.
//!
//! Authenticated calls read the `Authorization` header from the client's
//! shared default-header map, which the session manager sets and clears.

pub mod auth;
pub mod client;
pub mod error;

pub use auth::{AuthApi, SignInResponse};
pub use client::ApiClient;
pub use error::ApiError;
