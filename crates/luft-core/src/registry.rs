//! Device registry: one `DeviceRecord` per sensor id, created once, never removed.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use luft_md::SensorIdentity;

/// Textual prefix of every device id (`sensor-42`).
pub const DEVICE_ID_PREFIX: &str = "sensor-";

/// Schema context advertised for every device.
pub const DEVICE_SCHEMA_CONTEXT: &str = "https://iot.mozilla.org/schemas/";

pub const DEFAULT_DEVICE_DESCRIPTION: &str = "Luftdaten sensor";

/// Device id for a sensor id. Depends on nothing but `source_id`, so renames
/// of the sensor's display metadata never change a device's identity.
pub fn device_id_for(source_id: i64) -> String {
    format!("{DEVICE_ID_PREFIX}{source_id}")
}

// ---------------------------------------------------------------------------
// Property state
// ---------------------------------------------------------------------------

/// Declared value type of a property. Every reading is numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Number,
}

/// Presentation metadata handed to the host when a property is declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescription {
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub title: String,
    pub read_only: bool,
}

impl PropertyDescription {
    /// Description for a sensor reading: numeric, read-only, titled by its name.
    pub fn reading(name: &str) -> Self {
        Self {
            value_type: ValueType::Number,
            title: name.to_string(),
            read_only: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyState {
    pub name: String,
    pub description: PropertyDescription,
    /// Last present, non-empty reading. `None` until the first one arrives.
    pub last_value: Option<String>,
    /// Pass number of the last refresh.
    pub refreshed_pass: Option<u64>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl PropertyState {
    pub fn declare(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: PropertyDescription::reading(name),
            last_value: None,
            refreshed_pass: None,
            refreshed_at: None,
        }
    }

    /// A declared property is stale for `pass_seq` when that pass did not refresh it.
    pub fn is_stale(&self, pass_seq: u64) -> bool {
        self.refreshed_pass != Some(pass_seq)
    }
}

// ---------------------------------------------------------------------------
// Device record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Stable id, `sensor-{source_id}`.
    pub id: String,
    /// Identity as first seen. `display_name` is resolved at creation and
    /// never recomputed.
    pub identity: SensorIdentity,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Grows only; entries are never removed.
    pub properties: BTreeMap<String, PropertyState>,
}

impl DeviceRecord {
    fn create(identity: &SensorIdentity, description: &str) -> Self {
        let mut identity = identity.clone();
        identity.display_name = Some(identity.resolve_display_name());
        Self {
            id: device_id_for(identity.source_id),
            identity,
            description: description.to_string(),
            created_at: Utc::now(),
            properties: BTreeMap::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.identity.display_name.as_deref().unwrap_or(&self.id)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyState> {
        self.properties.get(name)
    }

    /// Stored value of a property, if declared and ever refreshed.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.properties.get(name)?.last_value.as_deref()
    }

    pub fn property_names(&self) -> Vec<&str> {
        self.properties.keys().map(String::as_str).collect()
    }

    /// Declared properties that pass `pass_seq` did not refresh.
    pub fn stale_properties(&self, pass_seq: u64) -> Vec<&str> {
        self.properties
            .values()
            .filter(|p| p.is_stale(pass_seq))
            .map(|p| p.name.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Owner of every `DeviceRecord`. Append-only with respect to devices.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    devices: HashMap<i64, DeviceRecord>,
    device_description: String,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_DESCRIPTION)
    }
}

impl DeviceRegistry {
    /// `device_description` is stamped on every device this registry creates.
    pub fn new(device_description: impl Into<String>) -> Self {
        Self {
            devices: HashMap::new(),
            device_description: device_description.into(),
        }
    }

    pub fn lookup(&self, source_id: i64) -> Option<&DeviceRecord> {
        self.devices.get(&source_id)
    }

    /// Return the device for `identity.source_id`, creating it on first sight.
    ///
    /// The flag is `true` only for the call that created the record; the
    /// caller must announce the device to the host exactly then.
    pub fn get_or_create(&mut self, identity: &SensorIdentity) -> (&mut DeviceRecord, bool) {
        match self.devices.entry(identity.source_id) {
            Entry::Occupied(e) => (e.into_mut(), false),
            Entry::Vacant(e) => {
                let record = DeviceRecord::create(identity, &self.device_description);
                (e.insert(record), true)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// All devices, ordered by sensor id.
    pub fn devices(&self) -> Vec<&DeviceRecord> {
        let mut out: Vec<&DeviceRecord> = self.devices.values().collect();
        out.sort_by_key(|d| d.identity.source_id);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(source_id: i64, kind: Option<&str>) -> SensorIdentity {
        SensorIdentity {
            source_id,
            kind: kind.map(str::to_string),
            vendor: None,
            display_name: None,
        }
    }

    #[test]
    fn device_id_is_prefix_plus_source_id() {
        assert_eq!(device_id_for(42), "sensor-42");
        assert_eq!(device_id_for(-3), "sensor--3");
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mut reg = DeviceRegistry::default();

        let (dev, created) = reg.get_or_create(&identity(42, Some("SDS011")));
        assert!(created);
        assert_eq!(dev.id, "sensor-42");
        assert!(dev.properties.is_empty());
        let created_at = dev.created_at;

        let (dev, created) = reg.get_or_create(&identity(42, Some("SDS011")));
        assert!(!created);
        assert_eq!(dev.created_at, created_at);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn display_name_is_resolved_once_at_creation() {
        let mut reg = DeviceRegistry::new("Balcony station");
        reg.get_or_create(&identity(7, Some("SDS011")));
        reg.get_or_create(&identity(7, Some("BME280")));

        let dev = reg.lookup(7).unwrap();
        assert_eq!(dev.display_name(), "SDS011");
        assert_eq!(dev.identity.kind.as_deref(), Some("SDS011"));
        assert_eq!(dev.description, "Balcony station");
    }

    #[test]
    fn lookup_unknown_is_none() {
        let reg = DeviceRegistry::default();
        assert!(reg.lookup(1).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn devices_are_listed_by_source_id() {
        let mut reg = DeviceRegistry::default();
        for id in [30, 10, 20] {
            reg.get_or_create(&identity(id, None));
        }
        let ids: Vec<&str> = reg.devices().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["sensor-10", "sensor-20", "sensor-30"]);
    }

    #[test]
    fn property_description_serializes_with_type_key() {
        let v = serde_json::to_value(PropertyDescription::reading("P1")).unwrap();
        assert_eq!(v["type"], "number");
        assert_eq!(v["title"], "P1");
        assert_eq!(v["read_only"], true);
    }
}
