//! luft-md
//!
//! Area snapshot ingest for luftdaten-style sensor networks.
//!
//! This crate owns the fetcher abstraction, the concrete HTTP fetcher and the
//! record normalizer. It does **not** keep any device state; callers
//! (luft-core) hand normalized measurements to the registry and reconciler.

pub mod batch;
pub mod normalizer;
pub mod provider;

pub use batch::{normalize_batch, NormalizeBatch, Rejection};
pub use normalizer::{normalize, MeasuredValue, NormalizedMeasurement, RecordRejected, SensorIdentity};
pub use provider::{AreaQuery, FetchError, LuftdatenFetcher, RawRecord, SnapshotFetcher, DEFAULT_BASE_URL};
