//! Poll task wiring: runs the schedule and mirrors its progress into
//! [`AppState`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use luft_core::{
    run_schedule, DeviceRegistry, PassError, PassObserver, PassReport, PollPhase, Poller,
    SchedulerStats,
};

use crate::api_types::DeviceView;
use crate::state::{AppState, BusMsg};

/// Observer that publishes phase, counters and a device snapshot.
pub struct DaemonObserver {
    state: Arc<AppState>,
    last_ok_pass: Option<u64>,
}

impl DaemonObserver {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            last_ok_pass: None,
        }
    }
}

#[async_trait::async_trait]
impl PassObserver for DaemonObserver {
    fn on_phase(&mut self, phase: PollPhase) {
        self.state.phase.send_replace(phase);
    }

    async fn on_pass(
        &mut self,
        outcome: &Result<PassReport, PassError>,
        registry: &DeviceRegistry,
        stats: &SchedulerStats,
    ) {
        if let Ok(report) = outcome {
            self.last_ok_pass = Some(report.pass_seq);
            let views = registry
                .devices()
                .into_iter()
                .map(|d| (d.id.clone(), DeviceView::from_record(d, self.last_ok_pass)))
                .collect();
            *self.state.devices.write().await = views;
        }

        {
            let mut st = self.state.status.write().await;
            st.passes_ok = stats.passes_ok;
            st.passes_failed = stats.passes_failed;
            st.ticks_skipped = stats.ticks_skipped;
            st.device_count = registry.len();
            match outcome {
                Ok(report) => {
                    st.last_report = Some(report.clone());
                    st.last_error = None;
                }
                Err(e) => st.last_error = Some(e.to_string()),
            }
        }

        let msg = match outcome {
            Ok(report) => BusMsg::PassCompleted(report.clone()),
            Err(e) => BusMsg::LogLine {
                level: "ERROR".to_string(),
                msg: e.to_string(),
            },
        };
        let _ = self.state.bus.send(msg);
    }
}

/// Spawn the poll schedule on its own task.
///
/// The task ends when `shutdown` flips to `true` and yields the poller back.
pub fn spawn_poller(
    state: Arc<AppState>,
    poller: Poller,
    period: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<(Poller, SchedulerStats)> {
    tokio::spawn(async move {
        {
            let mut st = state.status.write().await;
            st.source = Some(poller.source_name().to_string());
            st.poll_interval_secs = Some(period.as_secs());
        }
        let mut observer = DaemonObserver::new(state);
        run_schedule(poller, period, &mut observer, shutdown).await
    })
}
