//! Provider implementation for Twente Milieu using the 2go-mobile waste API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use kliko_core::{
    model::{AddressId, AddressQuery, CalendarWindow, PickupEntry},
    ports::{AddressPort, CalendarPort, PortError, ProviderPlugin},
};

/// Production endpoint of the waste API.
pub const BASE_URL: &str = "https://wasteapi.2go-mobile.com/api";

const PROVIDER_NAME: &str = "twentemilieu";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Response wrapper shared by all endpoints.
#[derive(Debug, Deserialize)]
struct DataList<T> {
    #[serde(rename = "dataList")]
    data_list: Vec<T>,
}

/// Address match from /FetchAdress
#[derive(Debug, Deserialize)]
struct AddressEntry {
    #[serde(rename = "AddressUniqueId")]
    unique_id: RawId,
    // street, city and more are returned but unused
}

/// The id comes back as a number on some deployments and a string on others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl From<RawId> for AddressId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Number(number) => AddressId(number.to_string()),
            RawId::Text(text) => AddressId(text),
        }
    }
}

/// Category block from /GetCalendar
#[derive(Debug, Deserialize)]
struct CalendarEntry {
    #[serde(rename = "_pickupTypeText")]
    pickup_type: String, // "GREEN", "PAPER", ...
    #[serde(rename = "pickupDates")]
    pickup_dates: Vec<String>,
}

/// HTTP client bound to one API base URL; implements both ports.
pub struct TwenteMilieuClient {
    client: Client,
    base_url: String,
}

impl TwenteMilieuClient {
    /// Create a client talking to the production API.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, BASE_URL)
    }

    /// Create a client talking to another deployment of the API.
    #[must_use]
    pub fn with_base_url<S: Into<String>>(client: Client, base_url: S) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    fn post(&self, endpoint: &str) -> RequestBuilder {
        self.client.post(format!("{}/{endpoint}", self.base_url))
    }
}

#[async_trait]
impl AddressPort for TwenteMilieuClient {
    async fn lookup(
        &self,
        query: &AddressQuery,
        company_code: &str,
    ) -> Result<Vec<AddressId>, PortError> {
        let req = self.post("FetchAdress").form(&[
            ("companyCode", company_code),
            ("postCode", query.postcode.as_str()),
            ("houseNumber", query.house_number.as_str()),
            ("houseLetter", query.addition.as_str()),
        ]);

        let resp = fetch_json::<DataList<AddressEntry>>(req).await?;
        debug!(address = %query, matches = resp.data_list.len(), "fetched address ids");

        Ok(resp
            .data_list
            .into_iter()
            .map(|entry| AddressId::from(entry.unique_id))
            .collect())
    }
}

#[async_trait]
impl CalendarPort for TwenteMilieuClient {
    async fn calendar(
        &self,
        address_id: &AddressId,
        window: CalendarWindow,
        company_code: &str,
    ) -> Result<Vec<PickupEntry>, PortError> {
        let start = format_day(window.start);
        let end = format_day(window.end);

        let req = self.post("GetCalendar").form(&[
            ("companyCode", company_code),
            ("uniqueAddressID", address_id.0.as_str()),
            ("startDate", start.as_str()),
            ("endDate", end.as_str()),
        ]);

        let resp = fetch_json::<DataList<CalendarEntry>>(req).await?;
        debug!(%address_id, categories = resp.data_list.len(), "fetched calendar");

        Ok(resp
            .data_list
            .into_iter()
            .map(|entry| PickupEntry {
                label: entry.pickup_type,
                dates: entry.pickup_dates,
            })
            .collect())
    }
}

/// Build a `reqwest` client with the given per-request timeout.
///
/// # Errors
///
/// Returns a [`PortError::Network`] when the TLS backend cannot be initialised.
pub fn client(timeout: Duration) -> Result<Client, PortError> {
    Ok(Client::builder()
        .user_agent(concat!("kliko/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()?)
}

/// Build the plugin bundle for the Twente Milieu provider.
#[must_use]
pub fn plugin(client: Client) -> ProviderPlugin {
    plugin_at(client, BASE_URL)
}

/// Build the plugin bundle against a custom base URL.
#[must_use]
pub fn plugin_at<S: Into<String>>(client: Client, base_url: S) -> ProviderPlugin {
    let api = Arc::new(TwenteMilieuClient::with_base_url(client, base_url));

    ProviderPlugin {
        name: PROVIDER_NAME.to_owned(),
        address_port: Arc::clone(&api) as Arc<dyn AddressPort>,
        calendar_port: api,
    }
}

fn format_day(day: NaiveDate) -> String {
    day.format(DATE_FORMAT).to_string()
}

// Body is decoded separately so structural problems surface as `Malformed`.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, PortError> {
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(PortError::Status(status.as_u16()));
    }
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|err| PortError::Malformed(err.to_string()))
}
