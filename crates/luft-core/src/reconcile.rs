//! Property reconciliation: applies one normalized measurement to its
//! device's property set and reports what changed.

use chrono::{DateTime, Utc};
use serde::Serialize;

use luft_md::NormalizedMeasurement;

use crate::registry::{DeviceRecord, PropertyState};
use crate::sink::DeviceSink;

/// Which pass is applying a measurement, and when it started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassStamp {
    pub seq: u64,
    pub at: DateTime<Utc>,
}

impl PassStamp {
    pub fn new(seq: u64) -> Self {
        Self { seq, at: Utc::now() }
    }
}

/// Effect or diagnostic produced while applying one reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyChange {
    /// First sighting of the property on this device.
    Declared { name: String },
    /// A present reading was stored and published.
    ValueChanged { name: String, value: String },
    /// The reading was absent or empty; the stored value is kept.
    ValueMissing { name: String },
    /// No property state could be established for the reading.
    PropertyMissing { name: String },
}

/// Apply one measurement to its device.
///
/// Readings are processed strictly in input order:
/// - an unseen name is declared first (even when its reading is absent),
/// - a present, non-empty reading overwrites `last_value` and is published,
/// - an absent or empty reading leaves `last_value` untouched.
///
/// A name repeated within one measurement is applied twice; the later
/// reading wins.
pub fn reconcile(
    device: &mut DeviceRecord,
    measurement: &NormalizedMeasurement,
    stamp: PassStamp,
    sink: &dyn DeviceSink,
) -> Vec<PropertyChange> {
    let mut changes = Vec::with_capacity(measurement.values.len());

    for reading in &measurement.values {
        let name = reading.name.as_str();

        if !device.properties.contains_key(name) {
            let state = PropertyState::declare(name);
            sink.declare_property(&device.id, name, &state.description);
            device.properties.insert(name.to_string(), state);
            changes.push(PropertyChange::Declared {
                name: name.to_string(),
            });
        }

        let Some(state) = device.properties.get_mut(name) else {
            tracing::warn!(device_id = %device.id, property = name, "could not find property {name}");
            changes.push(PropertyChange::PropertyMissing {
                name: name.to_string(),
            });
            continue;
        };

        match reading.raw_value.as_deref() {
            Some(value) if !value.is_empty() => {
                state.last_value = Some(value.to_string());
                state.refreshed_pass = Some(stamp.seq);
                state.refreshed_at = Some(stamp.at);
                sink.publish_value(&device.id, name, value);
                changes.push(PropertyChange::ValueChanged {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
            _ => {
                tracing::warn!(
                    device_id = %device.id,
                    property = name,
                    "could not find value for property {name}"
                );
                changes.push(PropertyChange::ValueMissing {
                    name: name.to_string(),
                });
            }
        }
    }

    changes
}
