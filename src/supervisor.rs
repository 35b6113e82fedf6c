//! Push channel lifecycle for one run.
//!
//! The supervisor opens the channel once and never reconnects; when it closes
//! or fails, the polling loop keeps the leaderboard fresh.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::normalize;
use crate::snapshot::{ConnectionState, RunHandle, SnapshotOrigin};
use crate::transport::PushTransport;
use crate::view::{Gate, Update, ViewStore};
use crate::wire::PushEvent;

/// What a handled message asks of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Continue,
    /// Training finished; close after the grace delay.
    Complete,
}

/// Routes push messages for one scope into the view store.
#[derive(Debug, Clone)]
pub struct PushDispatcher {
    run: RunHandle,
    store: ViewStore,
    scope: CancellationToken,
}

impl PushDispatcher {
    pub(crate) fn new(run: RunHandle, store: ViewStore, scope: CancellationToken) -> Self {
        Self { run, store, scope }
    }

    /// Handles one raw message. Malformed or unknown messages are logged and
    /// dropped; they never affect the connection.
    pub fn on_message(&self, raw: &str) -> Disposition {
        let event = match normalize::parse_push_event(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(run = %self.run, "Dropping push message: {}", e);
                return Disposition::Continue;
            }
        };

        match event {
            PushEvent::InitialState(payload) | PushEvent::EpochEnd(payload) => {
                let snapshot = normalize::from_metrics(&payload, SnapshotOrigin::Push);
                debug!(run = %self.run, epoch = snapshot.current_epoch, "Push snapshot");
                self.store
                    .apply(&self.scope, Update::Snapshot(snapshot, Gate::Always));
                Disposition::Continue
            }
            PushEvent::TrainingComplete(payload) => {
                if !payload.is_empty() {
                    let snapshot = normalize::from_metrics(&payload, SnapshotOrigin::Push);
                    self.store.apply(&self.scope, Update::FinalSnapshot(snapshot));
                }
                self.store.apply(&self.scope, Update::Completed);
                info!(run = %self.run, "Training complete");
                Disposition::Complete
            }
            PushEvent::Error(err) => {
                warn!(run = %self.run, "Training process reported: {}", err.text());
                self.store
                    .apply(&self.scope, Update::ServerError(err.text().to_string()));
                Disposition::Continue
            }
        }
    }
}

/// Owns the push channel task for one run.
#[derive(Debug)]
pub struct ConnectionSupervisor {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ConnectionSupervisor {
    /// Spawns the channel task. Must be called inside a tokio runtime.
    pub(crate) fn open<T: PushTransport>(
        transport: Arc<T>,
        run: RunHandle,
        store: ViewStore,
        scope: &CancellationToken,
        grace: Duration,
    ) -> Self {
        let token = scope.child_token();
        let dispatcher = PushDispatcher::new(run.clone(), store.clone(), scope.clone());
        let task = tokio::spawn(run_channel(
            transport,
            run,
            store,
            scope.clone(),
            token.clone(),
            dispatcher,
            grace,
        ));
        Self {
            token,
            task: Some(task),
        }
    }

    /// Requests closure. Idempotent; messages already queued are not dispatched.
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Closes and stops the task without waiting for it.
    pub(crate) fn shutdown(&mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_channel<T: PushTransport>(
    transport: Arc<T>,
    run: RunHandle,
    store: ViewStore,
    scope: CancellationToken,
    token: CancellationToken,
    dispatcher: PushDispatcher,
    grace: Duration,
) {
    store.apply(&scope, Update::Connection(ConnectionState::Connecting));

    let connected = tokio::select! {
        biased;
        _ = token.cancelled() => None,
        result = transport.connect(&run) => Some(result),
    };
    let mut stream = match connected {
        None => {
            store.apply(&scope, Update::Connection(ConnectionState::Closed));
            return;
        }
        Some(Err(e)) => {
            warn!(run = %run, "Push channel failed to open: {}", e);
            store.apply(&scope, Update::Connection(ConnectionState::Errored));
            return;
        }
        Some(Ok(stream)) => stream,
    };

    info!(run = %run, "Push channel open");
    store.apply(&scope, Update::Connection(ConnectionState::Open));

    let grace_timer = time::sleep(grace);
    tokio::pin!(grace_timer);
    let mut completing = false;

    let end = loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break ConnectionState::Closed,
            () = &mut grace_timer, if completing => {
                debug!(run = %run, "Grace period over, closing push channel");
                break ConnectionState::Closed;
            }
            frame = stream.next() => match frame {
                None => {
                    info!(run = %run, "Push channel closed by server");
                    break ConnectionState::Closed;
                }
                Some(Err(e)) => {
                    warn!(run = %run, "Push channel failed: {}", e);
                    break ConnectionState::Errored;
                }
                Some(Ok(raw)) => {
                    if token.is_cancelled() {
                        break ConnectionState::Closed;
                    }
                    if dispatcher.on_message(&raw) == Disposition::Complete && !completing {
                        completing = true;
                        grace_timer.as_mut().reset(Instant::now() + grace);
                    }
                }
            },
        }
    };

    drop(stream);
    store.apply(&scope, Update::Connection(end));
}
