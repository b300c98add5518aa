//! Shared runtime state for luft-daemon.
//!
//! All types here are `Clone`-able (via `Arc` or copy). Handlers receive
//! `State<Arc<AppState>>` from Axum. The poll task writes; handlers only read.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch, RwLock};

use luft_core::{DeviceRecord, DeviceSink, PassReport, PollPhase, PropertyDescription};

use crate::api_types::DeviceView;

// ---------------------------------------------------------------------------
// BusMsg (SSE event bus payload)
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    DeviceAdded {
        device: DeviceView,
    },
    PropertyDeclared {
        device_id: String,
        name: String,
        description: PropertyDescription,
    },
    ValueChanged {
        device_id: String,
        name: String,
        value: String,
    },
    PassCompleted(PassReport),
    LogLine {
        level: String,
        msg: String,
    },
}

impl BusMsg {
    /// SSE `event:` name for this message.
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::DeviceAdded { .. } => "device_added",
            BusMsg::PropertyDeclared { .. } => "property_declared",
            BusMsg::ValueChanged { .. } => "value_changed",
            BusMsg::PassCompleted(_) => "pass_completed",
            BusMsg::LogLine { .. } => "log",
        }
    }
}

// ---------------------------------------------------------------------------
// BusSink
// ---------------------------------------------------------------------------

/// Host sink that turns device effects into bus messages.
///
/// `broadcast::Sender::send` never waits. With no subscribers the message is
/// dropped; a slow subscriber lags instead of stalling the pass.
#[derive(Clone, Debug)]
pub struct BusSink {
    bus: broadcast::Sender<BusMsg>,
}

impl BusSink {
    pub fn new(bus: broadcast::Sender<BusMsg>) -> Self {
        Self { bus }
    }
}

impl DeviceSink for BusSink {
    fn announce_device(&self, device: &DeviceRecord) {
        let _ = self.bus.send(BusMsg::DeviceAdded {
            device: DeviceView::from_record(device, None),
        });
    }

    fn declare_property(&self, device_id: &str, name: &str, description: &PropertyDescription) {
        let _ = self.bus.send(BusMsg::PropertyDeclared {
            device_id: device_id.to_string(),
            name: name.to_string(),
            description: description.clone(),
        });
    }

    fn publish_value(&self, device_id: &str, name: &str, raw_value: &str) {
        let _ = self.bus.send(BusMsg::ValueChanged {
            device_id: device_id.to_string(),
            name: name.to_string(),
            value: raw_value.to_string(),
        });
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of the poll loop, returned by GET /v1/status.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    /// "idle" | "fetching" | "reconciling"
    pub phase: String,
    /// Upstream source name; `None` until the poll task starts.
    pub source: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub passes_ok: u64,
    pub passes_failed: u64,
    pub ticks_skipped: u64,
    pub device_count: usize,
    pub last_report: Option<PassReport>,
    /// Error of the most recent pass, cleared by the next successful one.
    pub last_error: Option<String>,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers and the poll task.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    /// Pass counters and last outcome, written after each pass.
    pub status: Arc<RwLock<StatusSnapshot>>,
    /// Live poll phase, written from inside a pass.
    pub phase: Arc<watch::Sender<PollPhase>>,
    /// Registry projection as of the latest successful pass, keyed by device id.
    pub devices: Arc<RwLock<BTreeMap<String, DeviceView>>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        let (phase, _rx) = watch::channel(PollPhase::Idle);

        Self {
            bus,
            build: BuildInfo {
                service: "luft-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            status: Arc::new(RwLock::new(StatusSnapshot {
                phase: PollPhase::Idle.as_str().to_string(),
                ..StatusSnapshot::default()
            })),
            phase: Arc::new(phase),
            devices: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Sink that publishes device effects on this state's bus.
    pub fn sink(&self) -> BusSink {
        BusSink::new(self.bus.clone())
    }

    pub fn current_phase(&self) -> PollPhase {
        *self.phase.borrow()
    }

    /// Status with live phase and uptime filled in.
    pub async fn status_snapshot(&self) -> StatusSnapshot {
        let mut snap = self.status.read().await.clone();
        snap.daemon_uptime_secs = uptime_secs();
        snap.phase = self.current_phase().as_str().to_string();
        snap
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}
