//! API client for communicating with the gymtrack REST API.
//!
//! Every request is built from the client's default-header map, so setting
//! the bearer token once authenticates all later calls on any clone.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::auth::SignInResponse;
use super::ApiError;
use crate::models::{Exercise, User};

// ============================================================================
// Constants
// ============================================================================

/// Default API location for a locally running backend
pub const DEFAULT_API_URL: &str = "http://localhost:3333";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignUpRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

/// API client for the gymtrack backend.
/// Clone is cheap and clones share the default-header map.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    default_headers: Arc<RwLock<header::HeaderMap>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            default_headers: Arc::new(RwLock::new(header::HeaderMap::new())),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Set `Authorization: Bearer <token>` for all subsequent requests
    pub fn set_bearer_token(&self, token: &str) -> Result<(), ApiError> {
        let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ApiError::InvalidResponse("token is not a valid header value".into()))?;
        value.set_sensitive(true);
        self.default_headers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(header::AUTHORIZATION, value);
        Ok(())
    }

    pub fn clear_authorization(&self) {
        self.default_headers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(header::AUTHORIZATION);
    }

    /// Current `Authorization` header value, if any
    pub fn authorization(&self) -> Option<String> {
        self.default_headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let headers = self
            .default_headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.client
            .request(method, url)
            .header(header::ACCEPT, "application/json")
            .headers(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        path: &str,
    ) -> Result<T, ApiError> {
        let response = builder.send().await?;
        debug!(path, status = %response.status(), "API response");
        let response = Self::check_response(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(self.request(Method::GET, path), path).await
    }

    /// `POST /sessions` with `{email, password}`
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignInResponse, ApiError> {
        let path = "/sessions";
        let builder = self
            .request(Method::POST, path)
            .json(&SignInRequest { email, password });
        self.send_json(builder, path).await
    }

    /// `POST /users` to create an account. Does not sign in.
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<(), ApiError> {
        let response = self
            .request(Method::POST, "/users")
            .json(&SignUpRequest {
                name,
                email,
                password,
            })
            .send()
            .await?;
        Self::check_response(response).await?;
        Ok(())
    }

    /// `GET /users/profile` for the signed-in user
    pub async fn fetch_profile(&self) -> Result<User, ApiError> {
        self.get("/users/profile").await
    }

    /// Muscle groups available in the exercise catalog
    pub async fn fetch_groups(&self) -> Result<Vec<String>, ApiError> {
        self.get("/groups").await
    }

    pub async fn fetch_exercises_by_group(&self, group: &str) -> Result<Vec<Exercise>, ApiError> {
        self.get(&format!("/exercises/bygroup/{}", urlencoding::encode(group)))
            .await
    }

    pub async fn fetch_exercise(&self, id: &str) -> Result<Exercise, ApiError> {
        self.get(&format!("/exercises/{}", urlencoding::encode(id)))
            .await
    }
}
