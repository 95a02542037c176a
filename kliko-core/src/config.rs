//! Immutable settings handed to the fetcher at construction.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Company code identifying Twente Milieu on the shared waste API.
pub const DEFAULT_COMPANY_CODE: &str = "8d97bb56-5afd-4cbc-a651-b4f7314264b4";

/// What a reading does when a fresh snapshot has no pickup for its category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingCategory {
    /// Keep showing the last known pickup.
    #[default]
    Retain,
    /// Reset the reading to unset.
    Clear,
}

/// Fetcher settings; defaults match the Twente Milieu integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Provider company code sent with every request.
    pub company_code: String,
    /// Minimum time between two calendar requests.
    #[serde(with = "seconds")]
    pub min_refresh_interval: Duration,
    /// Length of the requested calendar window in weeks.
    pub window_weeks: u32,
    /// Upper bound for a single provider request.
    #[serde(with = "seconds")]
    pub request_timeout: Duration,
    /// Policy for categories missing from a fresh snapshot.
    pub missing_category: MissingCategory,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            company_code: DEFAULT_COMPANY_CODE.to_owned(),
            min_refresh_interval: Duration::from_secs(12 * 60 * 60),
            window_weeks: 5,
            request_timeout: Duration::from_secs(30),
            missing_category: MissingCategory::Retain,
        }
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
