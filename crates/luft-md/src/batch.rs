//! Batch normalization for a whole fetched snapshot.
//!
//! Normalizes every record of a snapshot and splits the result into the
//! accepted measurements (upstream order preserved) and the per-record
//! rejections. A rejection never fails the batch.

use std::fmt;

use serde::Serialize;

use crate::normalizer::{normalize, NormalizedMeasurement, RecordRejected};
use crate::provider::RawRecord;

/// A record refused by the normalizer, keyed by its position in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// Zero-based index of the record in the fetched snapshot.
    pub index: usize,
    #[serde(serialize_with = "serialize_reason")]
    pub reason: RecordRejected,
}

fn serialize_reason<S: serde::Serializer>(r: &RecordRejected, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&r.to_string())
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record #{}: {}", self.index, self.reason)
    }
}

/// Result of [`normalize_batch`].
#[derive(Debug, Clone, Default)]
pub struct NormalizeBatch {
    /// Total number of input records.
    pub total: usize,
    pub accepted: Vec<NormalizedMeasurement>,
    pub rejected: Vec<Rejection>,
}

impl NormalizeBatch {
    /// `true` when every record was accepted.
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

impl fmt::Display for NormalizeBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NormalizeBatch {{ total: {}, accepted: {}, rejected: {} }}",
            self.total,
            self.accepted.len(),
            self.rejected.len()
        )
    }
}

/// Normalize all records of one snapshot.
///
/// Each rejection is logged individually at `warn` with its record index.
pub fn normalize_batch(records: &[RawRecord]) -> NormalizeBatch {
    let mut batch = NormalizeBatch {
        total: records.len(),
        ..NormalizeBatch::default()
    };

    for (index, raw) in records.iter().enumerate() {
        match normalize(raw) {
            Ok(m) => batch.accepted.push(m),
            Err(reason) => {
                tracing::warn!(record_index = index, %reason, "record rejected");
                batch.rejected.push(Rejection { index, reason });
            }
        }
    }

    batch
}
