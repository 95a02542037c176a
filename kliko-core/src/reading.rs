//! Per-category readings republishing the fetcher's snapshot to the host.

use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::config::MissingCategory;
use crate::fetcher::CalendarFetcher;
use crate::model::WasteCategory;

/// How the host should interpret a sensor's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    /// State is a point in time.
    Timestamp,
}

/// Capabilities a host adapter needs to render a sensor.
pub trait Sensor {
    /// Display name of the sensor.
    fn name(&self) -> &str;
    /// Current value, `None` while unknown.
    fn state(&self) -> Option<NaiveDateTime>;
    /// Frontend icon identifier.
    fn icon(&self) -> &str;
    /// Interpretation of [`Sensor::state`].
    fn device_class(&self) -> DeviceClass;
}

/// Next pickup date of one waste category.
pub struct CategoryReading {
    fetcher: Arc<CalendarFetcher>,
    category: WasteCategory,
    name: String,
    last_value: Option<NaiveDateTime>,
}

impl CategoryReading {
    /// Create a reading named `"{prefix} {display label}"`.
    #[must_use]
    pub fn new(fetcher: Arc<CalendarFetcher>, prefix: &str, category: WasteCategory) -> Self {
        Self {
            fetcher,
            name: format!("{prefix} {}", category.display_label()),
            category,
            last_value: None,
        }
    }

    /// Category this reading reports on.
    #[must_use]
    pub fn category(&self) -> WasteCategory {
        self.category
    }

    /// Last known next pickup.
    #[must_use]
    pub fn last_value(&self) -> Option<NaiveDateTime> {
        self.last_value
    }

    /// Trigger the shared fetcher, then pick up this category's next pickup.
    ///
    /// Refresh failures are logged by the fetcher and leave the value untouched.
    pub async fn refresh(&mut self) {
        if let Err(err) = self.fetcher.refresh().await {
            debug!(category = %self.category, "no update this cycle: {err}");
        }

        let Some(snapshot) = self.fetcher.snapshot() else {
            return;
        };

        match snapshot.get(self.category.provider_label()) {
            Some(next_pickup) => self.last_value = Some(next_pickup),
            None => match self.fetcher.config().missing_category {
                MissingCategory::Retain => {}
                MissingCategory::Clear => self.last_value = None,
            },
        }
        debug!(category = %self.category, value = ?self.last_value, "reading updated");
    }
}

impl Sensor for CategoryReading {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> Option<NaiveDateTime> {
        self.last_value
    }

    fn icon(&self) -> &str {
        self.category.icon()
    }

    fn device_class(&self) -> DeviceClass {
        DeviceClass::Timestamp
    }
}
