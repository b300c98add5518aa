//! Response types for the luft-daemon HTTP endpoints.
//!
//! `DeviceView` is the read-only projection of a registry record; the
//! registry itself never leaves the poll task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use luft_core::{DeviceRecord, PropertyState, ValueType, DEVICE_SCHEMA_CONTEXT};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// /v1/devices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyView {
    pub name: String,
    pub title: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub read_only: bool,
    pub value: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Not refreshed by the latest successful pass.
    pub stale: bool,
}

impl PropertyView {
    fn from_state(p: &PropertyState, last_pass: Option<u64>) -> Self {
        Self {
            name: p.name.clone(),
            title: p.description.title.clone(),
            value_type: p.description.value_type,
            read_only: p.description.read_only,
            value: p.last_value.clone(),
            refreshed_at: p.refreshed_at,
            stale: last_pass.map(|seq| p.is_stale(seq)).unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceView {
    #[serde(rename = "@context")]
    pub context: String,
    pub id: String,
    pub title: String,
    pub description: String,
    pub source_id: i64,
    pub kind: Option<String>,
    pub vendor: Option<String>,
    pub created_at: DateTime<Utc>,
    pub properties: Vec<PropertyView>,
}

impl DeviceView {
    /// Project `device`. Staleness is judged against `last_pass`, the
    /// sequence number of the latest successful pass.
    pub fn from_record(device: &DeviceRecord, last_pass: Option<u64>) -> Self {
        Self {
            context: DEVICE_SCHEMA_CONTEXT.to_string(),
            id: device.id.clone(),
            title: device.display_name().to_string(),
            description: device.description.clone(),
            source_id: device.identity.source_id,
            kind: device.identity.kind.clone(),
            vendor: device.identity.vendor.clone(),
            created_at: device.created_at,
            properties: device
                .properties
                .values()
                .map(|p| PropertyView::from_state(p, last_pass))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesResponse {
    pub devices: Vec<DeviceView>,
}
