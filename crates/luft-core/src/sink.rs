//! Host boundary: where device and property effects leave the core.
//!
//! Sinks are invoked synchronously from inside a reconciliation pass. An
//! implementation must return promptly and must not block on its consumers.

use crate::registry::{DeviceRecord, PropertyDescription};

pub trait DeviceSink: Send + Sync {
    /// A device was created. Called exactly once per device.
    fn announce_device(&self, device: &DeviceRecord);

    /// A property was declared on a device, before any value is published for it.
    fn declare_property(&self, device_id: &str, name: &str, description: &PropertyDescription);

    /// A present reading was stored. Called for every reading, repeated or not.
    fn publish_value(&self, device_id: &str, name: &str, raw_value: &str);
}

/// Sink that drops every effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DeviceSink for NullSink {
    fn announce_device(&self, _device: &DeviceRecord) {}

    fn declare_property(&self, _device_id: &str, _name: &str, _description: &PropertyDescription) {}

    fn publish_value(&self, _device_id: &str, _name: &str, _raw_value: &str) {}
}
