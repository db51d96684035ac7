//! HTTP client for the aircraft-tracking feed.
//!
//! One GET per cycle, no retries. The scheduler only sees the [`Feed`] trait,
//! so tests can substitute a scripted feed.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::bbox::BoundingBox;
use crate::config::FeedConfig;
use crate::error::{Error, Result};

/// Feed-selection flags appended to every request.
pub const FEED_FLAGS: &str = "faa=1&satellite=1&mlat=1&flarm=1&adsb=1&gnd=1&air=1&vehicles=1&estimated=1&maxage=14400&gliders=1&stats=1";

/// A source of raw feed payloads.
#[async_trait::async_trait]
pub trait Feed: Send + Sync {
    /// Fetch the raw payload for `bbox`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] when the feed cannot be reached and
    /// [`Error::FetchStatus`] when it answers with a non-success status.
    async fn fetch(&self, bbox: &BoundingBox) -> Result<Vec<u8>>;
}

/// Build the request URL for `bbox`: bounds in north, south, west, east
/// order with two decimals, followed by [`FEED_FLAGS`].
#[must_use]
pub fn feed_url(base_url: &str, bbox: &BoundingBox) -> String {
    format!(
        "{base_url}?bounds={:.2},{:.2},{:.2},{:.2}&{FEED_FLAGS}",
        bbox.lat_ne, bbox.lat_sw, bbox.lon_sw, bbox.lon_ne
    )
}

/// [`Feed`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFeed {
    client: Client,
    base_url: String,
}

impl HttpFeed {
    /// Create a feed client for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("flighttracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(client_build_error)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Create a feed client from the `[feed]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// The base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// A client that cannot be built is a setup problem, not a feed outage.
fn client_build_error(err: reqwest::Error) -> Error {
    Error::config(format!("cannot build feed client: {err}"))
}

#[async_trait::async_trait]
impl Feed for HttpFeed {
    async fn fetch(&self, bbox: &BoundingBox) -> Result<Vec<u8>> {
        let url = feed_url(&self.base_url, bbox);
        debug!("Fetching: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::FetchStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.bytes().await?;
        debug!(bytes = body.len(), "Feed payload received");
        Ok(body.to_vec())
    }
}
