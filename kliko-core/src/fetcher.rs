//! Throttled calendar fetcher shared by all readings of one address.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{Local, NaiveDate};
use tokio::sync::Mutex;
use tokio::time::{Instant, timeout};
use tracing::{debug, error, warn};

use crate::config::FetcherConfig;
use crate::error::{RefreshError, ResolutionError};
use crate::model::{AddressId, AddressQuery, CalendarWindow, ScheduleSnapshot};
use crate::ports::{CalendarPort, PortError, ProviderPlugin};

/// Result of a successful [`CalendarFetcher::refresh`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// A calendar request was made and a new snapshot stored.
    Fetched {
        /// Number of categories with a scheduled pickup.
        categories: usize,
    },
    /// The minimum interval has not elapsed; the snapshot is unchanged.
    Throttled,
}

/// Owns the resolved address and the latest pickup snapshot for it.
pub struct CalendarFetcher {
    provider: String,
    calendar_port: Arc<dyn CalendarPort>,
    address_id: AddressId,
    window: CalendarWindow,
    config: FetcherConfig,
    // Held across the request so concurrent refreshes share one round trip.
    last_attempt: Mutex<Option<Instant>>,
    snapshot: RwLock<Option<Arc<ScheduleSnapshot>>>,
}

impl CalendarFetcher {
    /// Resolve the address and build a fetcher with a window starting today.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolutionError`] when the lookup fails or finds no address.
    pub async fn initialize(
        plugin: &ProviderPlugin,
        query: AddressQuery,
        config: FetcherConfig,
    ) -> Result<Self, ResolutionError> {
        Self::initialize_on(plugin, query, config, Local::now().date_naive()).await
    }

    /// Like [`CalendarFetcher::initialize`], with an explicit first day for the window.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolutionError`] when the lookup fails or finds no address.
    pub async fn initialize_on(
        plugin: &ProviderPlugin,
        query: AddressQuery,
        config: FetcherConfig,
        today: NaiveDate,
    ) -> Result<Self, ResolutionError> {
        let Some(window) = CalendarWindow::starting(today, config.window_weeks) else {
            error!(provider = %plugin.name, weeks = config.window_weeks, "calendar window out of range");
            return Err(ResolutionError::WindowOutOfRange {
                weeks: config.window_weeks,
            });
        };

        let lookup = plugin.address_port.lookup(&query, &config.company_code);
        let candidates = timeout(config.request_timeout, lookup)
            .await
            .unwrap_or_else(|_elapsed| Err(PortError::Timeout(config.request_timeout)))
            .map_err(|err| {
                error!(provider = %plugin.name, address = %query, "cannot fetch the address id: {err}");
                ResolutionError::from(err)
            })?;

        let Some(address_id) = candidates.into_iter().next() else {
            error!(provider = %plugin.name, address = %query, "provider returned no address");
            return Err(ResolutionError::NotFound {
                postcode: query.postcode,
                house_number: query.house_number,
                addition: query.addition,
            });
        };
        debug!(provider = %plugin.name, address = %query, %address_id, "resolved address id");

        Ok(Self {
            provider: plugin.name.clone(),
            calendar_port: Arc::clone(&plugin.calendar_port),
            address_id,
            window,
            config,
            last_attempt: Mutex::new(None),
            snapshot: RwLock::new(None),
        })
    }

    /// Fetch a new snapshot unless the last attempt is younger than the minimum interval.
    ///
    /// Every attempt, failed or not, starts a new interval. On failure the snapshot
    /// becomes unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::Fetch`] on transport failures and
    /// [`RefreshError::Parse`] on malformed payloads.
    pub async fn refresh(&self) -> Result<Refresh, RefreshError> {
        let mut last_attempt = self.last_attempt.lock().await;
        let now = Instant::now();
        if let Some(previous) = *last_attempt
            && now.duration_since(previous) < self.config.min_refresh_interval
        {
            return Ok(Refresh::Throttled);
        }
        *last_attempt = Some(now);

        match self.fetch_snapshot().await {
            Ok(snapshot) => {
                let categories = snapshot.len();
                debug!(provider = %self.provider, address_id = %self.address_id, categories, "stored new pickup snapshot");
                self.store(Some(Arc::new(snapshot)));
                Ok(Refresh::Fetched { categories })
            }
            Err(err) => {
                warn!(provider = %self.provider, address_id = %self.address_id, "cannot refresh calendar data: {err}");
                self.store(None);
                Err(err)
            }
        }
    }

    async fn fetch_snapshot(&self) -> Result<ScheduleSnapshot, RefreshError> {
        let request_timeout = self.config.request_timeout;
        let calendar = self
            .calendar_port
            .calendar(&self.address_id, self.window, &self.config.company_code);
        let entries = timeout(request_timeout, calendar)
            .await
            .unwrap_or_else(|_elapsed| Err(PortError::Timeout(request_timeout)))?;
        for entry in &entries {
            debug!(label = %entry.label, dates = ?entry.dates, "calendar entry");
        }
        ScheduleSnapshot::from_entries(&entries)
    }

    fn store(&self, snapshot: Option<Arc<ScheduleSnapshot>>) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    /// Latest snapshot, or `None` while unavailable.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<ScheduleSnapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Identifier the address was resolved to.
    #[must_use]
    pub fn address_id(&self) -> &AddressId {
        &self.address_id
    }

    /// Calendar window requested on every refresh.
    #[must_use]
    pub fn window(&self) -> CalendarWindow {
        self.window
    }

    /// Settings this fetcher was built with.
    #[must_use]
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ports::PortError;
    use crate::testing::{FakeProvider, at, entry};

    async fn fetcher(provider: &Arc<FakeProvider>) -> CalendarFetcher {
        CalendarFetcher::initialize(&provider.plugin(), AddressQuery::new("7545KR", "1", ""), FetcherConfig::default())
            .await
            .expect("address resolves")
    }

    #[tokio::test]
    async fn initialize_takes_first_address() {
        let provider = FakeProvider::with_addresses(&["first", "second"]);
        let fetcher = fetcher(&provider).await;
        assert_eq!(fetcher.address_id(), &AddressId("first".to_owned()));
        assert!(fetcher.snapshot().is_none(), "nothing fetched yet");
    }

    #[tokio::test]
    async fn initialize_fails_without_addresses() {
        let provider = FakeProvider::with_addresses(&[]);
        let result =
            CalendarFetcher::initialize(&provider.plugin(), AddressQuery::new("7545KR", "1", ""), FetcherConfig::default())
                .await;
        assert!(matches!(result, Err(ResolutionError::NotFound { .. })), "empty lookup must fail");
    }

    #[tokio::test]
    async fn initialize_fails_on_lookup_error() {
        let provider = FakeProvider::failing_lookup(PortError::Malformed("missing dataList".to_owned()));
        let result =
            CalendarFetcher::initialize(&provider.plugin(), AddressQuery::new("7545KR", "1", ""), FetcherConfig::default())
                .await;
        assert!(matches!(result, Err(ResolutionError::Lookup(_))), "lookup error must abort setup");
    }

    #[tokio::test]
    async fn oversized_window_fails_instead_of_panicking() {
        let provider = FakeProvider::with_addresses(&["id"]);
        let config = FetcherConfig {
            window_weeks: 20_000_000,
            ..FetcherConfig::default()
        };
        let result =
            CalendarFetcher::initialize(&provider.plugin(), AddressQuery::new("7545KR", "1", ""), config).await;
        assert!(
            matches!(result, Err(ResolutionError::WindowOutOfRange { weeks: 20_000_000 })),
            "window past the calendar must abort setup"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_lookup_times_out() {
        let provider = FakeProvider::with_addresses(&["id"]);
        provider.stall();
        let result =
            CalendarFetcher::initialize(&provider.plugin(), AddressQuery::new("7545KR", "1", ""), FetcherConfig::default())
                .await;
        assert!(
            matches!(result, Err(ResolutionError::Lookup(PortError::Timeout(_)))),
            "lookup must be bounded by the request timeout"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_calendar_times_out_and_marks_unavailable() {
        let provider = FakeProvider::with_addresses(&["id"]);
        let fetcher = fetcher(&provider).await;
        provider.stall();

        let started = Instant::now();
        let result = fetcher.refresh().await;

        assert!(
            matches!(result, Err(RefreshError::Fetch(PortError::Timeout(_)))),
            "got {result:?}"
        );
        assert!(
            started.elapsed() >= FetcherConfig::default().request_timeout,
            "gave up only after the request timeout"
        );
        assert!(fetcher.snapshot().is_none(), "unavailable after timeout");
    }

    #[tokio::test]
    async fn window_starts_on_given_day() {
        let provider = FakeProvider::with_addresses(&["id"]);
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date");
        let fetcher = CalendarFetcher::initialize_on(
            &provider.plugin(),
            AddressQuery::new("7545KR", "1", ""),
            FetcherConfig::default(),
            today,
        )
        .await
        .expect("address resolves");
        assert_eq!(fetcher.window(), CalendarWindow::starting(today, 5).expect("in range"));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_is_throttled_within_interval() {
        let provider = FakeProvider::with_addresses(&["id"]);
        provider.push_calendar(Ok(vec![entry("GREY", &["2024-04-10T00:00:00"])]));
        provider.push_calendar(Ok(vec![entry("GREY", &["2024-05-10T00:00:00"])]));
        let fetcher = fetcher(&provider).await;

        assert_eq!(fetcher.refresh().await.expect("fetches"), Refresh::Fetched { categories: 1 });
        let first = fetcher.snapshot().expect("available");

        tokio::time::advance(Duration::from_secs(60 * 60)).await;
        assert_eq!(fetcher.refresh().await.expect("throttled"), Refresh::Throttled);
        assert_eq!(provider.calendar_calls(), 1);
        assert_eq!(fetcher.snapshot().expect("available"), first);

        tokio::time::advance(Duration::from_secs(11 * 60 * 60)).await;
        assert_eq!(fetcher.refresh().await.expect("fetches"), Refresh::Fetched { categories: 1 });
        assert_eq!(provider.calendar_calls(), 2);
        let second = fetcher.snapshot().expect("available");
        assert_eq!(second.get("GREY"), Some(at("2024-05-10T00:00:00")));
    }

    #[tokio::test]
    async fn refresh_replaces_whole_snapshot() {
        let provider = FakeProvider::with_addresses(&["id"]);
        provider.push_calendar(Ok(vec![
            entry("GREY", &["2024-04-10T00:00:00"]),
            entry("PAPER", &["2024-04-12T00:00:00"]),
        ]));
        provider.push_calendar(Ok(vec![entry("GREY", &["2024-04-24T00:00:00"]), entry("PAPER", &[])]));
        let config = FetcherConfig {
            min_refresh_interval: Duration::ZERO,
            ..FetcherConfig::default()
        };
        let fetcher =
            CalendarFetcher::initialize(&provider.plugin(), AddressQuery::new("7545KR", "1", ""), config)
                .await
                .expect("address resolves");

        fetcher.refresh().await.expect("first fetch");
        fetcher.refresh().await.expect("second fetch");

        let snapshot = fetcher.snapshot().expect("available");
        assert_eq!(snapshot.get("PAPER"), None);
        assert_eq!(snapshot.get("GREY"), Some(at("2024-04-24T00:00:00")));
    }

    #[tokio::test]
    async fn transport_failure_marks_snapshot_unavailable() {
        let provider = FakeProvider::with_addresses(&["id"]);
        provider.push_calendar(Ok(vec![entry("GREY", &["2024-04-10T00:00:00"])]));
        provider.push_calendar(Err(PortError::Status(503)));
        let config = FetcherConfig {
            min_refresh_interval: Duration::ZERO,
            ..FetcherConfig::default()
        };
        let fetcher =
            CalendarFetcher::initialize(&provider.plugin(), AddressQuery::new("7545KR", "1", ""), config)
                .await
                .expect("address resolves");

        fetcher.refresh().await.expect("first fetch");
        let result = fetcher.refresh().await;
        assert!(matches!(result, Err(RefreshError::Fetch(PortError::Status(503)))), "got {result:?}");
        assert!(fetcher.snapshot().is_none(), "unavailable after failure");
    }

    #[tokio::test]
    async fn malformed_payload_is_a_parse_error() {
        let provider = FakeProvider::with_addresses(&["id"]);
        provider.push_calendar(Err(PortError::Malformed("missing field `dataList`".to_owned())));
        let fetcher = fetcher(&provider).await;

        let result = fetcher.refresh().await;
        assert!(matches!(result, Err(RefreshError::Parse(_))), "got {result:?}");
        assert!(fetcher.snapshot().is_none(), "unavailable after parse error");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_attempt_is_throttled_too() {
        let provider = FakeProvider::with_addresses(&["id"]);
        provider.push_calendar(Err(PortError::Status(500)));
        let fetcher = fetcher(&provider).await;

        assert!(fetcher.refresh().await.is_err(), "first attempt fails");
        assert_eq!(fetcher.refresh().await.expect("throttled"), Refresh::Throttled);
        assert_eq!(provider.calendar_calls(), 1);
    }
}
