//! The rendered monitor state and its single write path.
//!
//! Both channels funnel every change through [`ViewStore::apply`]. The scope
//! token and the precedence rule are checked inside the same critical section
//! as the replacement, so a write can never slip in after its scope was torn
//! down or land while the push channel is open.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::snapshot::{ConnectionState, RunHandle, TrainingSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViewPhase {
    /// No run is being observed.
    Inactive,
    /// A run is active but no snapshot has been accepted yet.
    WaitingForData,
    Ready,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonitorView {
    pub run: Option<RunHandle>,
    pub connection: ConnectionState,
    pub snapshot: Option<Arc<TrainingSnapshot>>,
    pub training_complete: bool,
    /// Last error reported by the training process over the push channel.
    pub server_error: Option<String>,
    /// Snapshots accepted since activation.
    pub updates: u64,
}

impl MonitorView {
    pub fn phase(&self) -> ViewPhase {
        match (&self.run, &self.snapshot) {
            (None, _) => ViewPhase::Inactive,
            (Some(_), None) => ViewPhase::WaitingForData,
            (Some(_), Some(_)) => ViewPhase::Ready,
        }
    }

    pub fn is_live(&self) -> bool {
        self.run.is_some() && self.connection.is_open()
    }
}

/// When a snapshot write is allowed to land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gate {
    Always,
    /// Dropped while the push channel is open.
    UnlessPushOpen,
}

#[derive(Debug)]
pub(crate) enum Update {
    Connection(ConnectionState),
    Snapshot(TrainingSnapshot, Gate),
    /// Last snapshot of a run. When it names no models, the standings of the
    /// snapshot it replaces are carried into it.
    FinalSnapshot(TrainingSnapshot),
    Completed,
    ServerError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApplyOutcome {
    Applied,
    /// Nothing to change.
    Unchanged,
    /// Lost to the push channel under the precedence rule.
    Superseded,
    /// The scope that produced the write has been torn down.
    Cancelled,
}

/// Owner of the single [`MonitorView`]. Clones share the same view.
#[derive(Debug, Clone)]
pub struct ViewStore {
    tx: Arc<watch::Sender<MonitorView>>,
}

impl Default for ViewStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(MonitorView::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorView> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> MonitorView {
        self.tx.borrow().clone()
    }

    /// Fresh view for a new scope. Nothing from the previous run survives.
    pub(crate) fn reset(&self, run: RunHandle) {
        self.tx.send_replace(MonitorView {
            run: Some(run),
            connection: ConnectionState::Connecting,
            ..MonitorView::default()
        });
    }

    /// Marks the view inactive. Because this takes the write lock, every
    /// write that raced with the teardown has finished once it returns.
    pub(crate) fn seal(&self) {
        self.tx.send_modify(|view| {
            view.run = None;
            view.connection = ConnectionState::Closed;
        });
    }

    pub(crate) fn apply(&self, scope: &CancellationToken, update: Update) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::Unchanged;
        self.tx.send_if_modified(|view| {
            if scope.is_cancelled() {
                outcome = ApplyOutcome::Cancelled;
                return false;
            }
            match update {
                Update::Connection(state) => {
                    if view.connection == state {
                        return false;
                    }
                    view.connection = state;
                }
                Update::Snapshot(_, Gate::UnlessPushOpen) if view.connection.is_open() => {
                    outcome = ApplyOutcome::Superseded;
                    return false;
                }
                Update::Snapshot(snapshot, _) => {
                    view.snapshot = Some(Arc::new(snapshot));
                    view.updates += 1;
                }
                Update::FinalSnapshot(mut snapshot) => {
                    if let (true, Some(previous)) = (snapshot.entries.is_empty(), &view.snapshot) {
                        snapshot.entries = previous.entries.clone();
                        snapshot.degraded = previous.degraded;
                    }
                    view.snapshot = Some(Arc::new(snapshot));
                    view.updates += 1;
                }
                Update::Completed => {
                    if view.training_complete {
                        return false;
                    }
                    view.training_complete = true;
                }
                Update::ServerError(message) => {
                    view.server_error = Some(message);
                }
            }
            outcome = ApplyOutcome::Applied;
            true
        });
        outcome
    }
}
