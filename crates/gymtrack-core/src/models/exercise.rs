use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::string_or_number;

/// An exercise from the catalog, listed per muscle group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Exercise {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    pub group: String,
    pub series: u32,
    pub repetitions: u32,
    /// Thumbnail file name, served from `/exercise/thumb/{thumb}`
    pub thumb: Option<String>,
    /// Demonstration GIF file name, served from `/exercise/demo/{demo}`
    pub demo: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Exercise {
    pub fn summary(&self) -> String {
        format!("{} series x {} repetitions", self.series, self.repetitions)
    }

    pub fn thumb_url(&self, api_base_url: &str) -> Option<String> {
        self.thumb
            .as_ref()
            .map(|t| format!("{}/exercise/thumb/{}", api_base_url.trim_end_matches('/'), t))
    }

    pub fn demo_url(&self, api_base_url: &str) -> Option<String> {
        self.demo
            .as_ref()
            .map(|d| format!("{}/exercise/demo/{}", api_base_url.trim_end_matches('/'), d))
    }
}
