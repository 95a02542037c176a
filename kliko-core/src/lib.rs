//! Core types and refresh wiring for the kliko waste pickup sensors.

/// Immutable fetcher configuration supplied by the host.
pub mod config;
/// Error taxonomy for address resolution and calendar refreshes.
pub mod error;
/// Throttled calendar fetcher shared by all readings of one address.
pub mod fetcher;
/// Domain models for addresses, calendar windows, and pickup snapshots.
pub mod model;
/// Traits describing the provider interfaces.
pub mod ports;
/// Per-category readings exposed to the host platform.
pub mod reading;
/// Host-facing factory wiring a fetcher and its readings together.
pub mod setup;

pub use config::*;
pub use error::*;
pub use fetcher::*;
pub use model::*;
pub use ports::*;
pub use reading::*;
pub use setup::*;

#[cfg(test)]
mod testing;
