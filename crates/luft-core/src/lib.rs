//! luft-core
//!
//! Reconciliation engine for polled sensor snapshots.
//!
//! - `registry`: one device per sensor id, created once, never removed
//! - `reconcile`: maps a measurement onto a device's property set
//! - `pass`: one fetch → normalize → registry → reconcile cycle
//! - `scheduler`: fixed-period, non-overlapping pass loop
//!
//! Host integration happens through [`DeviceSink`]. No HTTP server, no
//! persistence.

pub mod pass;
pub mod reconcile;
pub mod registry;
pub mod scheduler;
pub mod sink;
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use pass::{PassError, PassReport, PollPhase, Poller};
pub use reconcile::{reconcile, PassStamp, PropertyChange};
pub use registry::{
    device_id_for, DeviceRecord, DeviceRegistry, PropertyDescription, PropertyState, ValueType,
    DEFAULT_DEVICE_DESCRIPTION, DEVICE_ID_PREFIX, DEVICE_SCHEMA_CONTEXT,
};
pub use scheduler::{run_schedule, PassObserver, SchedulerStats};
pub use sink::{DeviceSink, NullSink};
