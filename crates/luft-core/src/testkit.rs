//! In-memory doubles for the two external collaborators: a sink that records
//! every effect and a fetcher that replays scripted snapshots.
//!
//! Used by this crate's tests and by downstream scenario tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use luft_md::{FetchError, RawRecord, SnapshotFetcher};

use crate::registry::{DeviceRecord, PropertyDescription};
use crate::sink::DeviceSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    DeviceAnnounced { device_id: String, name: String },
    PropertyDeclared { device_id: String, name: String },
    ValuePublished { device_id: String, name: String, value: String },
}

/// Sink that appends every effect to an in-memory log.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn announced(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::DeviceAnnounced { device_id, .. } => Some(device_id),
                _ => None,
            })
            .collect()
    }

    pub fn declared(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::PropertyDeclared { device_id, name } => Some((device_id, name)),
                _ => None,
            })
            .collect()
    }

    pub fn published(&self) -> Vec<(String, String, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::ValuePublished {
                    device_id,
                    name,
                    value,
                } => Some((device_id, name, value)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut e) = self.events.lock() {
            e.clear();
        }
    }

    fn push(&self, ev: SinkEvent) {
        if let Ok(mut e) = self.events.lock() {
            e.push(ev);
        }
    }
}

impl DeviceSink for RecordingSink {
    fn announce_device(&self, device: &DeviceRecord) {
        self.push(SinkEvent::DeviceAnnounced {
            device_id: device.id.clone(),
            name: device.display_name().to_string(),
        });
    }

    fn declare_property(&self, device_id: &str, name: &str, _description: &PropertyDescription) {
        self.push(SinkEvent::PropertyDeclared {
            device_id: device_id.to_string(),
            name: name.to_string(),
        });
    }

    fn publish_value(&self, device_id: &str, name: &str, raw_value: &str) {
        self.push(SinkEvent::ValuePublished {
            device_id: device_id.to_string(),
            name: name.to_string(),
            value: raw_value.to_string(),
        });
    }
}

/// Fetcher that returns queued results in order, then empty snapshots.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<Vec<RawRecord>, FetchError>>>,
    delay: Option<Duration>,
}

impl ScriptedFetcher {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Result<Vec<RawRecord>, FetchError>>,
    {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            delay: None,
        }
    }

    /// Sleep this long inside every fetch, to simulate a slow upstream.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, result: Result<Vec<RawRecord>, FetchError>) {
        if let Ok(mut s) = self.script.lock() {
            s.push_back(result);
        }
    }
}

#[async_trait::async_trait]
impl SnapshotFetcher for ScriptedFetcher {
    fn source_name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_snapshot(&self) -> Result<Vec<RawRecord>, FetchError> {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}
