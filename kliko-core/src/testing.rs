//! In-memory provider used by the unit tests.

use std::collections::VecDeque;
use std::future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::model::{AddressId, AddressQuery, CalendarWindow, PICKUP_DATE_FORMAT, PickupEntry};
use crate::ports::{AddressPort, CalendarPort, PortError, ProviderPlugin};

pub(crate) fn entry(label: &str, dates: &[&str]) -> PickupEntry {
    PickupEntry {
        label: label.to_owned(),
        dates: dates.iter().map(|date| (*date).to_owned()).collect(),
    }
}

pub(crate) fn at(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, PICKUP_DATE_FORMAT).expect("valid test date")
}

type CalendarResult = Result<Vec<PickupEntry>, PortError>;

/// Scripted provider: answers lookups from a fixed list and calendar calls from a queue.
pub(crate) struct FakeProvider {
    addresses: Mutex<Option<Result<Vec<AddressId>, PortError>>>,
    calendars: Mutex<VecDeque<CalendarResult>>,
    calendar_calls: AtomicUsize,
    stalled: AtomicBool,
}

impl FakeProvider {
    pub(crate) fn with_addresses(ids: &[&str]) -> Arc<Self> {
        let ids = ids.iter().map(|id| AddressId((*id).to_owned())).collect();
        Self::new(Ok(ids))
    }

    pub(crate) fn failing_lookup(err: PortError) -> Arc<Self> {
        Self::new(Err(err))
    }

    fn new(addresses: Result<Vec<AddressId>, PortError>) -> Arc<Self> {
        Arc::new(Self {
            addresses: Mutex::new(Some(addresses)),
            calendars: Mutex::new(VecDeque::new()),
            calendar_calls: AtomicUsize::new(0),
            stalled: AtomicBool::new(false),
        })
    }

    pub(crate) fn plugin(self: &Arc<Self>) -> ProviderPlugin {
        ProviderPlugin {
            name: "fake".to_owned(),
            address_port: Arc::clone(self) as Arc<dyn AddressPort>,
            calendar_port: Arc::clone(self) as Arc<dyn CalendarPort>,
        }
    }

    pub(crate) fn push_calendar(&self, response: CalendarResult) {
        self.calendars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    /// Make every following call hang forever.
    pub(crate) fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    async fn wait_if_stalled(&self) {
        if self.stalled.load(Ordering::SeqCst) {
            future::pending::<()>().await;
        }
    }

    pub(crate) fn calendar_calls(&self) -> usize {
        self.calendar_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressPort for FakeProvider {
    async fn lookup(
        &self,
        _query: &AddressQuery,
        _company_code: &str,
    ) -> Result<Vec<AddressId>, PortError> {
        self.wait_if_stalled().await;
        self.addresses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[async_trait]
impl CalendarPort for FakeProvider {
    async fn calendar(
        &self,
        _address_id: &AddressId,
        _window: CalendarWindow,
        _company_code: &str,
    ) -> Result<Vec<PickupEntry>, PortError> {
        self.calendar_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_if_stalled().await;
        self.calendars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
