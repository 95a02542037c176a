//! Domain data structures for addresses, calendar windows, and pickup schedules.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::RefreshError;

/// Format of the pickup timestamps returned by the provider.
pub const PICKUP_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Physical address used to look up the provider's address identifier.
pub struct AddressQuery {
    /// Dutch postcode, e.g. `7545KR`.
    pub postcode: String,
    /// House number without addition.
    pub house_number: String,
    /// Optional house letter or addition, empty when absent.
    #[serde(default)]
    pub addition: String,
}

impl AddressQuery {
    /// Construct a new query, trimming surrounding whitespace.
    #[must_use]
    pub fn new<P: Into<String>, H: Into<String>, A: Into<String>>(
        postcode: P,
        house_number: H,
        addition: A,
    ) -> Self {
        Self {
            postcode: postcode.into().trim().to_owned(),
            house_number: house_number.into().trim().to_owned(),
            addition: addition.into().trim().to_owned(),
        }
    }
}

impl fmt::Display for AddressQuery {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} {}{}", self.postcode, self.house_number, self.addition)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Opaque identifier the provider assigns to a resolved address.
pub struct AddressId(pub String);

impl fmt::Display for AddressId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Half-open `[start, end)` range of days requested from the provider.
pub struct CalendarWindow {
    /// First day (inclusive).
    pub start: NaiveDate,
    /// Last day (exclusive).
    pub end: NaiveDate,
}

impl CalendarWindow {
    /// Window of `weeks` weeks beginning on `today`, `None` past the last representable date.
    #[must_use]
    pub fn starting(today: NaiveDate, weeks: u32) -> Option<Self> {
        let end = TimeDelta::try_weeks(i64::from(weeks))
            .and_then(|length| today.checked_add_signed(length))?;
        Some(Self { start: today, end })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Pickup dates for one provider category, as returned by the calendar call.
pub struct PickupEntry {
    /// Raw provider label of the category.
    pub label: String,
    /// Pickup timestamps in provider order; may be empty.
    pub dates: Vec<String>,
}

impl PickupEntry {
    /// Earliest pickup of this entry, or `None` when no dates are listed.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::Parse`] when a date does not match [`PICKUP_DATE_FORMAT`].
    pub fn earliest(&self) -> Result<Option<NaiveDateTime>, RefreshError> {
        let mut earliest: Option<NaiveDateTime> = None;
        for raw in &self.dates {
            let parsed = NaiveDateTime::parse_from_str(raw, PICKUP_DATE_FORMAT).map_err(|err| {
                RefreshError::Parse(format!("invalid pickup date {raw:?} for {}: {err}", self.label))
            })?;
            earliest = Some(earliest.map_or(parsed, |current| current.min(parsed)));
        }
        Ok(earliest)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Next pickup per provider label, built fresh from one calendar response.
pub struct ScheduleSnapshot {
    next_pickups: BTreeMap<String, NaiveDateTime>,
}

impl ScheduleSnapshot {
    /// Build a snapshot, skipping entries without pickup dates.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::Parse`] when any pickup date is malformed.
    pub fn from_entries(entries: &[PickupEntry]) -> Result<Self, RefreshError> {
        let mut next_pickups = BTreeMap::new();
        for entry in entries {
            if let Some(date) = entry.earliest()? {
                next_pickups.insert(entry.label.clone(), date);
            }
        }
        Ok(Self { next_pickups })
    }

    /// Next pickup for the given provider label.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<NaiveDateTime> {
        self.next_pickups.get(label).copied()
    }

    /// Number of categories with a scheduled pickup.
    #[must_use]
    pub fn len(&self) -> usize {
        self.next_pickups.len()
    }

    /// Whether no category has a scheduled pickup.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.next_pickups.is_empty()
    }

    /// Iterate over `(label, next pickup)` pairs ordered by label.
    pub fn iter(&self) -> impl Iterator<Item = (&str, NaiveDateTime)> {
        self.next_pickups
            .iter()
            .map(|(label, date)| (label.as_str(), *date))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
/// Waste streams a reading can be configured for.
pub enum WasteCategory {
    /// Organic garden and kitchen waste.
    Green,
    /// Plastic packaging and drink cartons.
    Packages,
    /// Paper and cardboard.
    Paper,
    /// Residual waste.
    Grey,
}

impl WasteCategory {
    /// Every supported category.
    pub const ALL: [WasteCategory; 4] = [
        WasteCategory::Green,
        WasteCategory::Packages,
        WasteCategory::Paper,
        WasteCategory::Grey,
    ];

    /// Label the provider uses for this category in calendar responses.
    #[must_use]
    pub fn provider_label(self) -> &'static str {
        match self {
            WasteCategory::Green => "GREEN",
            WasteCategory::Packages => "PACKAGES",
            WasteCategory::Paper => "PAPER",
            WasteCategory::Grey => "GREY",
        }
    }

    /// Human-friendly Dutch name appended to the sensor name.
    #[must_use]
    pub fn display_label(self) -> &'static str {
        match self {
            WasteCategory::Green => "GFT",
            WasteCategory::Packages => "Plastic en Verpakking",
            WasteCategory::Paper => "Papier",
            WasteCategory::Grey => "Restafval",
        }
    }

    /// Frontend icon identifier.
    #[must_use]
    pub fn icon(self) -> &'static str {
        "mdi:delete-empty"
    }
}

impl fmt::Display for WasteCategory {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.provider_label())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown waste category: {0}")]
/// A configured category name did not match any [`WasteCategory`].
pub struct UnknownCategory(pub String);

impl FromStr for WasteCategory {
    type Err = UnknownCategory;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim();
        WasteCategory::ALL
            .into_iter()
            .find(|category| category.provider_label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownCategory(raw.to_owned()))
    }
}
