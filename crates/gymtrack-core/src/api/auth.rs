use async_trait::async_trait;
use serde::Deserialize;

use super::{ApiClient, ApiError};
use crate::models::User;

/// Body of a sign-in response. Either field may be missing on a malformed reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignInResponse {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub token: Option<String>,
}

/// What the session manager needs from the network side: one authentication
/// call, plus control over the `Authorization` default header.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn authenticate(&self, email: &str, password: &str) -> Result<SignInResponse, ApiError>;

    fn set_bearer_token(&self, token: &str) -> Result<(), ApiError>;

    fn clear_bearer_token(&self);
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn authenticate(&self, email: &str, password: &str) -> Result<SignInResponse, ApiError> {
        self.sign_in(email, password).await
    }

    fn set_bearer_token(&self, token: &str) -> Result<(), ApiError> {
        ApiClient::set_bearer_token(self, token)
    }

    fn clear_bearer_token(&self) {
        self.clear_authorization();
    }
}
