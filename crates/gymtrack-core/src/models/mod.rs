//! Data models for gymtrack entities.
//!
//! - `User`: the signed-in identity, persisted by the credential store
//! - `Exercise`: catalog entries browsed by muscle group

pub mod exercise;
pub mod user;

pub use exercise::Exercise;
pub use user::User;

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Id {
    Text(String),
    Number(i64),
}

impl Id {
    fn into_string(self) -> String {
        match self {
            Id::Text(s) => s,
            Id::Number(n) => n.to_string(),
        }
    }
}

// The API sends numeric ids; persisted records may already hold strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Id::deserialize(deserializer).map(Id::into_string)
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Id>::deserialize(deserializer)?.map(Id::into_string))
}
