//! Snapshot fetcher boundary for area sensor snapshots.
//!
//! This module defines the raw record type, the fetcher trait and the
//! concrete HTTP fetcher for the luftdaten area filter endpoint.
//! No normalization, no registry logic and no scheduling belong here.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Raw record
// ---------------------------------------------------------------------------

/// One element of a fetched snapshot, exactly as the upstream returned it.
///
/// The payload is kept as an untyped JSON tree: upstream records are not
/// guaranteed to be fully populated and any field may be absent, null or of
/// an unexpected shape. Field extraction happens in `normalizer.rs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub serde_json::Value);

impl RawRecord {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for RawRecord {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// Area query
// ---------------------------------------------------------------------------

/// Geographic filter sent to the upstream: a circle around a point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaQuery {
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in kilometres.
    pub radius_km: f64,
}

impl AreaQuery {
    /// Path segment understood by the area filter endpoint,
    /// e.g. `filter/area=52.52,13.405,5`.
    pub fn filter_path(&self) -> String {
        format!(
            "filter/area={},{},{}",
            self.latitude, self.longitude, self.radius_km
        )
    }
}

impl fmt::Display for AreaQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) r={}km",
            self.latitude, self.longitude, self.radius_km
        )
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`SnapshotFetcher`] may return. All of them abort one pass only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network or transport failure (connect, timeout, body read).
    #[error("transport error: {0}")]
    Transport(String),
    /// The upstream answered with a non-success HTTP status.
    #[error("upstream http error status={status}")]
    Status { status: u16 },
    /// The response body was not a JSON array of records.
    #[error("decode error: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Fetcher trait
// ---------------------------------------------------------------------------

/// Upstream snapshot source contract.
///
/// Object safe, so callers can hold a `Box<dyn SnapshotFetcher>`, and
/// `Send + Sync` so the poll task can own it across await points.
#[async_trait::async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Human-readable name identifying this source (e.g. `"luftdaten"`).
    fn source_name(&self) -> &'static str;

    /// Fetch the current snapshot. Records are returned in upstream order.
    async fn fetch_snapshot(&self) -> Result<Vec<RawRecord>, FetchError>;
}

// ---------------------------------------------------------------------------
// HTTP fetcher
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "http://api.luftdaten.info/v1";

/// Area-filter fetcher backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct LuftdatenFetcher {
    http: reqwest::Client,
    base_url: String,
    area: AreaQuery,
}

impl LuftdatenFetcher {
    pub fn new(area: AreaQuery, timeout: Duration) -> Result<Self, FetchError> {
        Self::new_with_base_url(DEFAULT_BASE_URL.to_string(), area, timeout)
    }

    pub fn new_with_base_url(
        base_url: String,
        area: AreaQuery,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url,
            area,
        })
    }

    pub fn area(&self) -> AreaQuery {
        self.area
    }

    pub fn build_area_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.area.filter_path()
        )
    }
}

#[async_trait::async_trait]
impl SnapshotFetcher for LuftdatenFetcher {
    fn source_name(&self) -> &'static str {
        "luftdaten"
    }

    async fn fetch_snapshot(&self) -> Result<Vec<RawRecord>, FetchError> {
        let url = self.build_area_url();
        tracing::debug!(%url, "fetching area snapshot");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        serde_json::from_slice::<Vec<RawRecord>>(&body)
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
