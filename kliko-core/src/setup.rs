//! Factory used by the host to create the sensors for one configured address.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::FetcherConfig;
use crate::error::ResolutionError;
use crate::fetcher::CalendarFetcher;
use crate::model::{AddressQuery, WasteCategory};
use crate::ports::ProviderPlugin;
use crate::reading::CategoryReading;

/// Name prefix used when the host configures none.
pub const DEFAULT_NAME: &str = "Twente Milieu";

fn default_name() -> String {
    DEFAULT_NAME.to_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Host configuration for one address.
pub struct SensorSetup {
    /// Dutch postcode.
    pub postcode: String,
    /// House number.
    pub house_number: String,
    /// House letter or addition.
    #[serde(default)]
    pub addition: String,
    /// Prefix for every sensor name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Categories to create readings for.
    #[serde(default)]
    pub categories: Vec<WasteCategory>,
}

/// Shared fetcher and the readings built on top of it.
pub struct AddressSensors {
    /// Fetcher shared by all readings.
    pub fetcher: Arc<CalendarFetcher>,
    /// One reading per requested category, in configuration order.
    pub readings: Vec<CategoryReading>,
}

/// Resolve the configured address and create its readings.
///
/// # Errors
///
/// Returns a [`ResolutionError`] when the address cannot be resolved; no readings are created.
pub async fn setup_address(
    plugin: &ProviderPlugin,
    setup: SensorSetup,
    config: FetcherConfig,
) -> Result<AddressSensors, ResolutionError> {
    let query = AddressQuery::new(setup.postcode, setup.house_number, setup.addition);
    let fetcher = Arc::new(CalendarFetcher::initialize(plugin, query, config).await?);

    let mut categories: Vec<WasteCategory> = Vec::with_capacity(setup.categories.len());
    for category in setup.categories {
        if !categories.contains(&category) {
            categories.push(category);
        }
    }

    let readings: Vec<CategoryReading> = categories
        .into_iter()
        .map(|category| CategoryReading::new(Arc::clone(&fetcher), &setup.name, category))
        .collect();
    info!(provider = %plugin.name, address_id = %fetcher.address_id(), readings = readings.len(), "sensors set up");

    Ok(AddressSensors { fetcher, readings })
}
