//! Record normalization for fetched area snapshots.
//!
//! This module converts an untyped [`RawRecord`] into a
//! [`NormalizedMeasurement`]: a stable sensor identity plus an ordered list
//! of named readings.
//!
//! It does **not**:
//! - fetch data (see `provider.rs`)
//! - know which devices already exist
//! - decide what to do with the readings (that is the reconciler in luft-core)
//!
//! Upstream record shape (every field optional):
//!
//! ```text
//! { "sensor": { "id": 42,
//!               "sensor_type": { "name": "SDS011", "manufacturer": "Nova Fitness" } },
//!   "sensordatavalues": [ { "value_type": "P1", "value": "10.5" }, ... ] }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::provider::RawRecord;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Identity of one physical reporting unit.
///
/// Only `source_id` is load-bearing. `kind` and `vendor` are presentation
/// metadata and are consulted once, when a device is first created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorIdentity {
    pub source_id: i64,
    /// Sensor model, e.g. `"SDS011"`.
    pub kind: Option<String>,
    /// Sensor manufacturer, e.g. `"Nova Fitness"`.
    pub vendor: Option<String>,
    /// Resolved human-readable name. `None` until a device is created.
    pub display_name: Option<String>,
}

impl SensorIdentity {
    pub fn new(source_id: i64) -> Self {
        Self {
            source_id,
            kind: None,
            vendor: None,
            display_name: None,
        }
    }

    /// Human-readable name derived from the vendor/type metadata.
    ///
    /// - vendor and kind known: `"{vendor} {kind}"`
    /// - only kind known: `"{kind}"`
    /// - otherwise: `"Sensor {source_id}"`
    pub fn resolve_display_name(&self) -> String {
        if let Some(name) = &self.display_name {
            return name.clone();
        }
        match (self.vendor.as_deref(), self.kind.as_deref()) {
            (Some(vendor), Some(kind)) => format!("{vendor} {kind}"),
            (None, Some(kind)) => kind.to_string(),
            _ => format!("Sensor {}", self.source_id),
        }
    }
}

/// One named reading. `raw_value == None` means "no reading this round",
/// which is distinct from `Some("")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasuredValue {
    pub name: String,
    pub raw_value: Option<String>,
}

impl MeasuredValue {
    pub fn new(name: impl Into<String>, raw_value: Option<&str>) -> Self {
        Self {
            name: name.into(),
            raw_value: raw_value.map(str::to_string),
        }
    }
}

/// A validated record: stable identity plus readings in upstream order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedMeasurement {
    pub identity: SensorIdentity,
    pub values: Vec<MeasuredValue>,
}

// ---------------------------------------------------------------------------
// Rejection type
// ---------------------------------------------------------------------------

/// Reasons a whole record is refused. A refused record touches no device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordRejected {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("record has no sensor id")]
    MissingSourceId,
    #[error("sensor id is not a valid integer: {raw}")]
    InvalidSourceId { raw: String },
}

// ---------------------------------------------------------------------------
// Field extraction
// ---------------------------------------------------------------------------

fn extract_source_id(v: Option<&Value>) -> Result<i64, RecordRejected> {
    match v {
        None | Some(Value::Null) => Err(RecordRejected::MissingSourceId),
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| RecordRejected::InvalidSourceId {
            raw: n.to_string(),
        }),
        Some(Value::String(s)) => {
            s.trim()
                .parse::<i64>()
                .map_err(|_| RecordRejected::InvalidSourceId { raw: s.clone() })
        }
        Some(other) => Err(RecordRejected::InvalidSourceId {
            raw: other.to_string(),
        }),
    }
}

/// Non-empty string field, or `None`.
fn extract_label(v: Option<&Value>) -> Option<String> {
    match v {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Reading value: strings pass through verbatim, numbers are rendered as
/// decimal text, null and anything else count as absent.
fn extract_reading(v: Option<&Value>) -> Option<String> {
    match v {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn extract_values(source_id: i64, v: Option<&Value>) -> Vec<MeasuredValue> {
    let Some(Value::Array(entries)) = v else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        let Some(name) = extract_label(entry.get("value_type")) else {
            tracing::debug!(source_id, entry = idx, "dropping reading without a name");
            continue;
        };
        out.push(MeasuredValue {
            name,
            raw_value: extract_reading(entry.get("value")),
        });
    }
    out
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize a single [`RawRecord`].
///
/// Returns `Err` only when the record has no usable sensor id. Nameless
/// readings are dropped without failing the record; a missing value list
/// yields a measurement with no readings.
pub fn normalize(raw: &RawRecord) -> Result<NormalizedMeasurement, RecordRejected> {
    let Value::Object(record) = raw.as_value() else {
        return Err(RecordRejected::NotAnObject);
    };

    let sensor = record.get("sensor");
    let source_id = extract_source_id(sensor.and_then(|s| s.get("id")))?;

    let sensor_type = sensor.and_then(|s| s.get("sensor_type"));
    let identity = SensorIdentity {
        source_id,
        kind: extract_label(sensor_type.and_then(|t| t.get("name"))),
        vendor: extract_label(sensor_type.and_then(|t| t.get("manufacturer"))),
        display_name: None,
    };

    let values = extract_values(source_id, record.get("sensordatavalues"));

    Ok(NormalizedMeasurement { identity, values })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
