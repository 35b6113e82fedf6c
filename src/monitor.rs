//! Lifecycle of the live training view.
//!
//! A [`LiveMonitor`] observes at most one run at a time. Activating a run
//! creates a scope: one cancellation token, one push channel, one polling
//! loop. Switching runs or deactivating tears the whole scope down before the
//! view is touched again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{MonitorConfig, POLL_PERIOD};
use crate::error::MonitorError;
use crate::poller::{PollCounters, PollStats, PollingLoop};
use crate::snapshot::RunHandle;
use crate::supervisor::ConnectionSupervisor;
use crate::transport::{PushTransport, TelemetrySource};
use crate::view::{MonitorView, ViewStore};

struct ActiveScope {
    run: RunHandle,
    token: CancellationToken,
    channel: ConnectionSupervisor,
    poller: PollingLoop,
}

pub struct LiveMonitor<S: TelemetrySource, T: PushTransport> {
    source: Arc<S>,
    transport: Arc<T>,
    grace: Duration,
    store: ViewStore,
    counters: Arc<PollCounters>,
    scope: Option<ActiveScope>,
}

#[cfg(all(feature = "http", feature = "ws"))]
impl LiveMonitor<crate::transport::HttpSource, crate::transport::WsTransport> {
    /// Monitor wired to the real HTTP endpoints and WebSocket channel.
    pub fn connect(config: MonitorConfig) -> Result<Self, crate::error::FetchError> {
        let config = Arc::new(config);
        let source = crate::transport::HttpSource::new(config.clone())?;
        let transport = crate::transport::WsTransport::new(config.clone());
        Ok(Self::new(Arc::new(source), Arc::new(transport), &config))
    }
}

impl<S: TelemetrySource, T: PushTransport> LiveMonitor<S, T> {
    pub fn new(source: Arc<S>, transport: Arc<T>, config: &MonitorConfig) -> Self {
        Self {
            source,
            transport,
            grace: config.completion_grace(),
            store: ViewStore::new(),
            counters: Arc::new(PollCounters::default()),
            scope: None,
        }
    }

    /// Starts observing `run_id`. Must be called inside a tokio runtime.
    ///
    /// Re-activating the run already observed is a no-op. Activating a
    /// different run tears the current scope down first.
    pub fn activate(&mut self, run_id: &str) -> Result<(), MonitorError> {
        let run = RunHandle::new(run_id).ok_or(MonitorError::MissingRunId)?;
        if self.scope.as_ref().is_some_and(|s| s.run == run) {
            debug!(run = %run, "Already observing run");
            return Ok(());
        }
        self.deactivate();

        info!(run = %run, "Observing run");
        self.store.reset(run.clone());
        self.counters = Arc::new(PollCounters::default());

        let token = CancellationToken::new();
        let channel = ConnectionSupervisor::open(
            self.transport.clone(),
            run.clone(),
            self.store.clone(),
            &token,
            self.grace,
        );
        let poller = PollingLoop::start(
            self.source.clone(),
            run.clone(),
            self.store.clone(),
            &token,
            self.counters.clone(),
            POLL_PERIOD,
        );
        self.scope = Some(ActiveScope {
            run,
            token,
            channel,
            poller,
        });
        Ok(())
    }

    /// Stops observing. The last snapshot stays visible but the view reports
    /// no active run. Safe to call at any time.
    pub fn deactivate(&mut self) {
        let Some(mut scope) = self.scope.take() else {
            return;
        };
        scope.token.cancel();
        scope.channel.shutdown();
        scope.poller.shutdown();
        self.store.seal();
        info!(run = %scope.run, "Stopped observing run");
    }

    pub fn run(&self) -> Option<&RunHandle> {
        self.scope.as_ref().map(|s| &s.run)
    }

    pub fn is_active(&self) -> bool {
        self.scope.is_some()
    }

    pub fn view(&self) -> MonitorView {
        self.store.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorView> {
        self.store.subscribe()
    }

    /// Polling counters for the current (or most recent) scope.
    pub fn poll_stats(&self) -> PollStats {
        self.counters.stats()
    }
}

impl<S: TelemetrySource, T: PushTransport> Drop for LiveMonitor<S, T> {
    fn drop(&mut self) {
        self.deactivate();
    }
}
