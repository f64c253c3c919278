use thiserror::Error;

use crate::api::ApiError;
use crate::storage::StorageError;

/// Shown for failures that have no user-facing message of their own
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again later.";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Sign-in response is missing the {missing}")]
    MalformedResponse { missing: &'static str },

    #[error("No user is signed in")]
    NotSignedIn,
}

impl SessionError {
    /// Whether the message is meant to be shown to the user verbatim.
    pub fn is_expected(&self) -> bool {
        match self {
            SessionError::Api(e) => e.is_expected(),
            SessionError::NotSignedIn => true,
            SessionError::Storage(_) | SessionError::MalformedResponse { .. } => false,
        }
    }

    pub fn user_message(&self) -> String {
        self.user_message_or(GENERIC_ERROR_MESSAGE)
    }

    /// The error's own message if it is user-facing, otherwise `fallback`.
    pub fn user_message_or(&self, fallback: &str) -> String {
        if self.is_expected() {
            self.to_string()
        } else {
            fallback.to_string()
        }
    }
}
