//! Errors surfaced by the fetcher during setup and steady-state refreshes.

use crate::ports::PortError;

#[derive(thiserror::Error, Debug)]
/// Address lookup failed; no fetcher or readings are created.
pub enum ResolutionError {
    /// The lookup request failed or returned malformed data.
    #[error("Address lookup failed: {0}")]
    Lookup(#[from] PortError),
    /// The provider knows no address matching the query.
    #[error("No address found for {postcode} {house_number}{addition}")]
    NotFound {
        /// Queried postcode.
        postcode: String,
        /// Queried house number.
        house_number: String,
        /// Queried addition, empty when absent.
        addition: String,
    },
    /// The configured calendar window reaches past the last representable date.
    #[error("Calendar window of {weeks} weeks is out of range")]
    WindowOutOfRange {
        /// Configured window length.
        weeks: u32,
    },
}

#[derive(thiserror::Error, Debug)]
/// A calendar refresh failed; the snapshot is marked unavailable.
pub enum RefreshError {
    /// Transport failure talking to the provider.
    #[error("Fetch error: {0}")]
    Fetch(#[source] PortError),
    /// Provider payload or one of its dates could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<PortError> for RefreshError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Malformed(reason) => RefreshError::Parse(reason),
            other @ (PortError::Network(_) | PortError::Status(_) | PortError::Timeout(_)) => RefreshError::Fetch(other),
        }
    }
}
