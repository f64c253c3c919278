use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::opt_string_or_number;

/// Profile of the signed-in user.
///
/// Only the identity fields are typed. Anything else the server sends
/// (timestamps, preferences) is kept in `extra` and written back untouched
/// when the record is persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Avatar file name or URL, as returned by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(flatten)]
    #[cfg_attr(feature = "ts", ts(skip))]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Self::default()
        }
    }

    /// True for the placeholder record produced from an absent storage slot (`{}`).
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.name.is_empty()
            && self.email.is_empty()
            && self.avatar.is_none()
            && self.extra.is_empty()
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.email
        } else {
            &self.name
        }
    }

    /// Resolve the avatar against the API's static file route.
    /// Absolute URLs are returned as-is.
    pub fn avatar_url(&self, api_base_url: &str) -> Option<String> {
        let avatar = self.avatar.as_deref().filter(|a| !a.is_empty())?;
        if avatar.starts_with("http://") || avatar.starts_with("https://") {
            Some(avatar.to_string())
        } else {
            Some(format!(
                "{}/avatar/{}",
                api_base_url.trim_end_matches('/'),
                avatar
            ))
        }
    }
}
