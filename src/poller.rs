//! Fixed-period pull fallback.
//!
//! The loop ticks for as long as its scope lives, whatever the push channel
//! is doing. Results only land while the push channel is not open.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::normalize;
use crate::snapshot::{RunHandle, SnapshotOrigin, TrainingSnapshot};
use crate::transport::TelemetrySource;
use crate::view::{ApplyOutcome, Gate, Update, ViewStore};

/// Counters for one polling scope.
#[derive(Debug, Default)]
pub struct PollCounters {
    ticks: AtomicU64,
    pulls: AtomicU64,
    applied: AtomicU64,
    superseded: AtomicU64,
    cancelled: AtomicU64,
    failed: AtomicU64,
    overlap_waits: AtomicU64,
    overlap_aborts: AtomicU64,
}

/// Point-in-time copy of [`PollCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollStats {
    pub ticks: u64,
    pub pulls: u64,
    /// Results written to the view.
    pub applied: u64,
    /// Results discarded because the push channel was open.
    pub superseded: u64,
    /// Results discarded because their scope was torn down.
    pub cancelled: u64,
    /// Both endpoints failed, or the run is not training.
    pub failed: u64,
    /// Ticks that found the previous pull still outstanding.
    pub overlap_waits: u64,
    /// Outstanding pulls abandoned after waiting a full period.
    pub overlap_aborts: u64,
}

impl PollCounters {
    pub fn stats(&self) -> PollStats {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        PollStats {
            ticks: get(&self.ticks),
            pulls: get(&self.pulls),
            applied: get(&self.applied),
            superseded: get(&self.superseded),
            cancelled: get(&self.cancelled),
            failed: get(&self.failed),
            overlap_waits: get(&self.overlap_waits),
            overlap_aborts: get(&self.overlap_aborts),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Pulls one snapshot: live metrics first, training status as a fallback.
///
/// Returns `None` when both fail or the status endpoint reports anything
/// other than `training`.
pub async fn pull_once<S: TelemetrySource>(source: &S, run: &RunHandle) -> Option<TrainingSnapshot> {
    match source.live_metrics(run).await {
        Ok(payload) => return Some(normalize::from_metrics(&payload, SnapshotOrigin::PrimaryPoll)),
        Err(e) => debug!(run = %run, "Live metrics unavailable, trying status: {}", e),
    }

    match source.training_status().await {
        Ok(status) if status.is_training() => Some(normalize::from_status(&status)),
        Ok(status) => {
            debug!(run = %run, status = %status.status, "Not training, leaving snapshot as is");
            None
        }
        Err(e) => {
            warn!(run = %run, "Both pull endpoints failed: {}", e);
            None
        }
    }
}

/// One pull plus its write. `scope` is captured when the pull starts and
/// checked again when the result is written.
pub(crate) async fn pull_and_apply<S: TelemetrySource>(
    source: Arc<S>,
    run: RunHandle,
    store: ViewStore,
    scope: CancellationToken,
    counters: Arc<PollCounters>,
) -> ApplyOutcome {
    PollCounters::bump(&counters.pulls);
    let Some(snapshot) = pull_once(source.as_ref(), &run).await else {
        PollCounters::bump(&counters.failed);
        return ApplyOutcome::Unchanged;
    };

    let outcome = store.apply(&scope, Update::Snapshot(snapshot, Gate::UnlessPushOpen));
    match outcome {
        ApplyOutcome::Applied => PollCounters::bump(&counters.applied),
        ApplyOutcome::Superseded => {
            debug!(run = %run, "Push channel open, discarding pulled snapshot");
            PollCounters::bump(&counters.superseded);
        }
        ApplyOutcome::Cancelled => {
            debug!(run = %run, "Scope gone, discarding pulled snapshot");
            PollCounters::bump(&counters.cancelled);
        }
        ApplyOutcome::Unchanged => {}
    }
    outcome
}

/// Owns the timer task for one run.
#[derive(Debug)]
pub struct PollingLoop {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollingLoop {
    /// Spawns the timer task. Must be called inside a tokio runtime.
    pub(crate) fn start<S: TelemetrySource>(
        source: Arc<S>,
        run: RunHandle,
        store: ViewStore,
        scope: &CancellationToken,
        counters: Arc<PollCounters>,
        period: Duration,
    ) -> Self {
        let token = scope.child_token();
        let task = tokio::spawn(run_loop(
            source,
            run,
            store,
            scope.clone(),
            token.clone(),
            counters,
            period,
        ));
        Self {
            token,
            task: Some(task),
        }
    }

    /// Stops the timer and any outstanding pull.
    pub(crate) fn shutdown(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for PollingLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Aborts the wrapped pull when dropped, so a stopped loop leaves nothing behind.
struct PendingPull(JoinHandle<ApplyOutcome>);

impl Drop for PendingPull {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run_loop<S: TelemetrySource>(
    source: Arc<S>,
    run: RunHandle,
    store: ViewStore,
    scope: CancellationToken,
    token: CancellationToken,
    counters: Arc<PollCounters>,
    period: Duration,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut pending: Option<PendingPull> = None;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        PollCounters::bump(&counters.ticks);

        if let Some(mut previous) = pending.take() {
            if !previous.0.is_finished() {
                PollCounters::bump(&counters.overlap_waits);
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    joined = time::timeout(period, &mut previous.0) => {
                        if joined.is_err() {
                            warn!(run = %run, "Pull outstanding for a full period, abandoning it");
                            PollCounters::bump(&counters.overlap_aborts);
                            previous.0.abort();
                            let _ = (&mut previous.0).await;
                        }
                    }
                }
            }
            // `previous` drops here; aborting a finished task is a no-op.
        }

        pending = Some(PendingPull(tokio::spawn(pull_and_apply(
            source.clone(),
            run.clone(),
            store.clone(),
            scope.clone(),
            counters.clone(),
        ))));
    }
    debug!(run = %run, "Polling stopped");
}
