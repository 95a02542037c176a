//! Traits describing provider capabilities and the plugin bundle tying them together.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Error as ReqwestError;

use crate::model::{AddressId, AddressQuery, CalendarWindow, PickupEntry};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to a provider backend.
pub enum PortError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// Provider answered with a non-success HTTP status.
    #[error("Unexpected HTTP status {0}")]
    Status(u16),
    /// Provider did not answer within the configured request timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Provider payload did not have the expected structure.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

#[async_trait]
/// Trait for provider-specific address lookup backends.
pub trait AddressPort: Send + Sync {
    /// Resolve an address to the identifiers the provider knows it by, best match first.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the provider request fails or the payload is malformed.
    async fn lookup(
        &self,
        query: &AddressQuery,
        company_code: &str,
    ) -> Result<Vec<AddressId>, PortError>;
}

#[async_trait]
/// Trait for provider-specific pickup calendar backends.
pub trait CalendarPort: Send + Sync {
    /// Fetch per-category pickup entries for an address within the window.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the provider request fails or the payload is malformed.
    async fn calendar(
        &self,
        address_id: &AddressId,
        window: CalendarWindow,
        company_code: &str,
    ) -> Result<Vec<PickupEntry>, PortError>;
}

/// Collection of ports implementing one waste provider.
#[derive(Clone)]
pub struct ProviderPlugin {
    /// Provider name, used in log output.
    pub name: String,
    /// Implementation for resolving addresses.
    pub address_port: Arc<dyn AddressPort>,
    /// Implementation for fetching pickup calendars.
    pub calendar_port: Arc<dyn CalendarPort>,
}
