//! One reconciliation pass: fetch → normalize → registry → reconcile.
//!
//! The [`Poller`] owns the registry. `run_pass` takes `&mut self`, so two
//! passes over the same registry cannot be in flight at once.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use luft_md::{normalize_batch, FetchError, Rejection, SnapshotFetcher};

use crate::reconcile::{reconcile, PassStamp, PropertyChange};
use crate::registry::DeviceRegistry;
use crate::sink::DeviceSink;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    Idle,
    Fetching,
    Reconciling,
}

impl PollPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollPhase::Idle => "idle",
            PollPhase::Fetching => "fetching",
            PollPhase::Reconciling => "reconciling",
        }
    }
}

// ---------------------------------------------------------------------------
// Report / error
// ---------------------------------------------------------------------------

/// Accounting for one completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub pass_seq: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub records_fetched: usize,
    pub records_accepted: usize,
    pub rejected: Vec<Rejection>,
    pub devices_created: usize,
    pub properties_declared: usize,
    pub values_published: usize,
    pub values_missing: usize,
    pub properties_missing: usize,
}

impl PassReport {
    fn tally(&mut self, changes: &[PropertyChange]) {
        for c in changes {
            match c {
                PropertyChange::Declared { .. } => self.properties_declared += 1,
                PropertyChange::ValueChanged { .. } => self.values_published += 1,
                PropertyChange::ValueMissing { .. } => self.values_missing += 1,
                PropertyChange::PropertyMissing { .. } => self.properties_missing += 1,
            }
        }
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pass #{}: fetched={} accepted={} rejected={} created={} declared={} published={} missing={}",
            self.pass_seq,
            self.records_fetched,
            self.records_accepted,
            self.rejected.len(),
            self.devices_created,
            self.properties_declared,
            self.values_published,
            self.values_missing
        )
    }
}

/// A pass that ended before touching any device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassError {
    #[error("pass #{pass_seq} aborted: fetch failed: {source}")]
    Fetch {
        pass_seq: u64,
        #[source]
        source: FetchError,
    },
}

impl PassError {
    pub fn pass_seq(&self) -> u64 {
        match self {
            PassError::Fetch { pass_seq, .. } => *pass_seq,
        }
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

pub struct Poller {
    fetcher: Box<dyn SnapshotFetcher>,
    sink: Arc<dyn DeviceSink>,
    registry: DeviceRegistry,
    pass_seq: u64,
    phase: PollPhase,
}

impl Poller {
    pub fn new(
        fetcher: Box<dyn SnapshotFetcher>,
        sink: Arc<dyn DeviceSink>,
        registry: DeviceRegistry,
    ) -> Self {
        Self {
            fetcher,
            sink,
            registry,
            pass_seq: 0,
            phase: PollPhase::Idle,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    /// Number of passes started so far (failed ones included).
    pub fn passes_started(&self) -> u64 {
        self.pass_seq
    }

    pub fn source_name(&self) -> &'static str {
        self.fetcher.source_name()
    }

    pub async fn run_pass(&mut self) -> Result<PassReport, PassError> {
        self.run_pass_observed(|_| {}).await
    }

    /// Run one pass, reporting each phase transition to `on_phase`.
    ///
    /// A fetch failure returns before the registry is touched. A rejected
    /// record is reported in the pass report and skipped; it never fails
    /// the pass.
    pub async fn run_pass_observed<F>(&mut self, mut on_phase: F) -> Result<PassReport, PassError>
    where
        F: FnMut(PollPhase) + Send,
    {
        self.pass_seq += 1;
        let stamp = PassStamp::new(self.pass_seq);
        let started = Instant::now();

        self.enter(PollPhase::Fetching, &mut on_phase);
        let records = match self.fetcher.fetch_snapshot().await {
            Ok(r) => r,
            Err(source) => {
                self.enter(PollPhase::Idle, &mut on_phase);
                tracing::error!(pass_seq = stamp.seq, error = %source, "snapshot fetch failed");
                return Err(PassError::Fetch {
                    pass_seq: stamp.seq,
                    source,
                });
            }
        };

        self.enter(PollPhase::Reconciling, &mut on_phase);
        let batch = normalize_batch(&records);

        let mut report = PassReport {
            pass_seq: stamp.seq,
            started_at: Some(stamp.at),
            records_fetched: batch.total,
            records_accepted: batch.accepted.len(),
            rejected: batch.rejected,
            ..PassReport::default()
        };

        let sink = Arc::clone(&self.sink);
        for measurement in &batch.accepted {
            let (device, created) = self.registry.get_or_create(&measurement.identity);
            if created {
                tracing::info!(
                    device_id = %device.id,
                    source_id = measurement.identity.source_id,
                    "creating new device for {}",
                    measurement.identity.source_id
                );
                sink.announce_device(device);
                report.devices_created += 1;
            }
            let changes = reconcile(device, measurement, stamp, sink.as_ref());
            report.tally(&changes);
        }

        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.enter(PollPhase::Idle, &mut on_phase);

        tracing::info!(
            pass_seq = report.pass_seq,
            fetched = report.records_fetched,
            rejected = report.rejected.len(),
            created = report.devices_created,
            published = report.values_published,
            devices = self.registry.len(),
            "pass complete"
        );
        Ok(report)
    }

    fn enter<F: FnMut(PollPhase)>(&mut self, phase: PollPhase, on_phase: &mut F) {
        self.phase = phase;
        on_phase(phase);
    }
}

impl fmt::Debug for Poller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("source", &self.fetcher.source_name())
            .field("devices", &self.registry.len())
            .field("pass_seq", &self.pass_seq)
            .field("phase", &self.phase)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{RecordingSink, ScriptedFetcher};
    use luft_md::RawRecord;
    use serde_json::json;

    #[tokio::test]
    async fn phases_run_fetching_reconciling_idle() {
        let fetcher = ScriptedFetcher::new([Ok(vec![RawRecord::new(json!({ "sensor": { "id": 1 } }))])]);
        let mut poller = Poller::new(
            Box::new(fetcher),
            Arc::new(RecordingSink::default()),
            DeviceRegistry::default(),
        );

        let mut seen = Vec::new();
        poller.run_pass_observed(|p| seen.push(p)).await.unwrap();

        assert_eq!(
            seen,
            vec![PollPhase::Fetching, PollPhase::Reconciling, PollPhase::Idle]
        );
        assert_eq!(poller.phase(), PollPhase::Idle);
    }

    #[tokio::test]
    async fn fetch_failure_skips_reconciling() {
        let fetcher = ScriptedFetcher::new([Err(FetchError::Status { status: 500 })]);
        let mut poller = Poller::new(
            Box::new(fetcher),
            Arc::new(RecordingSink::default()),
            DeviceRegistry::default(),
        );

        let mut seen = Vec::new();
        let err = poller.run_pass_observed(|p| seen.push(p)).await.unwrap_err();

        assert_eq!(err.pass_seq(), 1);
        assert_eq!(seen, vec![PollPhase::Fetching, PollPhase::Idle]);
        assert!(poller.registry().is_empty());
    }

    #[test]
    fn report_display_is_one_line() {
        let r = PassReport {
            pass_seq: 3,
            records_fetched: 2,
            records_accepted: 2,
            devices_created: 1,
            properties_declared: 2,
            values_published: 1,
            values_missing: 1,
            ..PassReport::default()
        };
        assert_eq!(
            r.to_string(),
            "pass #3: fetched=2 accepted=2 rejected=0 created=1 declared=2 published=1 missing=1"
        );
    }
}
