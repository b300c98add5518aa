//! Fixed-period poll scheduling.
//!
//! One pass runs immediately, then one per period on a fixed grid. Passes
//! run sequentially on a single task. Every grid tick that comes due while a
//! pass is still running is dropped, never queued: the next pass starts on
//! the first grid tick after the overrunning pass ends. A failed pass does
//! not stop the schedule.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::pass::{PassError, PassReport, PollPhase, Poller};
use crate::registry::DeviceRegistry;

/// Running totals kept by the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub passes_ok: u64,
    pub passes_failed: u64,
    /// Grid ticks that came due during a pass and were dropped.
    pub ticks_skipped: u64,
}

/// Receives scheduler progress from the poll task.
///
/// `on_phase` runs inline while a pass is in flight and must not block.
/// `on_pass` runs after the pass, when the registry is quiescent.
#[async_trait::async_trait]
pub trait PassObserver: Send {
    fn on_phase(&mut self, _phase: PollPhase) {}

    async fn on_pass(
        &mut self,
        outcome: &Result<PassReport, PassError>,
        registry: &DeviceRegistry,
        stats: &SchedulerStats,
    );
}

/// Grid ticks in `(deadline, deadline + elapsed]`, i.e. the ticks that came
/// due while a pass started at `deadline` was running.
fn overrun_ticks(elapsed: Duration, period: Duration) -> u64 {
    if period.is_zero() {
        return 0;
    }
    u64::try_from(elapsed.as_nanos() / period.as_nanos()).unwrap_or(u64::MAX)
}

/// Drive `poller` every `period` until `shutdown` flips to `true`.
///
/// Shutdown is only observed between passes; an in-flight pass always
/// runs to completion. Returns the poller so callers can inspect the
/// final registry.
pub async fn run_schedule<O: PassObserver>(
    mut poller: Poller,
    period: Duration,
    observer: &mut O,
    mut shutdown: watch::Receiver<bool>,
) -> (Poller, SchedulerStats) {
    let period = period.max(Duration::from_millis(1));
    let mut stats = SchedulerStats::default();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        source = poller.source_name(),
        period_secs = period.as_secs_f64(),
        "poll schedule started"
    );

    loop {
        if *shutdown.borrow() {
            break;
        }
        let deadline = tokio::select! {
            deadline = ticker.tick() => deadline,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        };

        let outcome = poller.run_pass_observed(|p| observer.on_phase(p)).await;

        match &outcome {
            Ok(_) => stats.passes_ok += 1,
            Err(_) => stats.passes_failed += 1,
        }

        // `Skip` collapses every missed tick into one that is already due;
        // consume it here so it does not start a pass immediately.
        let skipped = overrun_ticks(deadline.elapsed(), period);
        if skipped > 0 {
            ticker.tick().await;
            tracing::debug!(skipped, "pass overran the poll period; dropping ticks");
            stats.ticks_skipped += skipped;
        }

        observer.on_pass(&outcome, poller.registry(), &stats).await;
    }

    tracing::info!(
        passes_ok = stats.passes_ok,
        passes_failed = stats.passes_failed,
        "poll schedule stopped"
    );
    (poller, stats)
}
