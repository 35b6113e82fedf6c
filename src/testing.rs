//! In-memory stand-ins for the push channel and the pull endpoints.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures_util::{stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{FetchError, TransportError};
use crate::snapshot::RunHandle;
use crate::transport::{PushStream, PushTransport, TelemetrySource};
use crate::wire::{MetricsPayload, StatusPayload};

/// Lets every ready task run, then advances the paused clock a little.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

type Frame = Result<String, TransportError>;

enum Script {
    Accept(mpsc::UnboundedReceiver<Frame>),
    Refuse(String),
    Hang,
}

/// Push transport that plays back scripted connection attempts in order.
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Script>>,
    attempts: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Next attempt succeeds; the returned feed plays the server side.
    pub(crate) fn accept(&self) -> PushFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script.lock().unwrap().push_back(Script::Accept(rx));
        PushFeed { tx }
    }

    pub(crate) fn refuse(&self, reason: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Script::Refuse(reason.to_string()));
    }

    /// Next attempt never completes.
    pub(crate) fn hang(&self) {
        self.script.lock().unwrap().push_back(Script::Hang);
    }

    pub(crate) fn connect_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl PushTransport for ScriptedTransport {
    async fn connect(&self, _run: &RunHandle) -> Result<PushStream, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Script::Accept(rx)) => Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|frame| (frame, rx))
            })
            .boxed()),
            Some(Script::Refuse(reason)) => Err(TransportError::Unavailable(reason)),
            Some(Script::Hang) => std::future::pending().await,
            None => Err(TransportError::Unavailable("no scripted connection".into())),
        }
    }
}

/// Server side of an accepted scripted connection. Dropping it closes the channel.
pub(crate) struct PushFeed {
    tx: mpsc::UnboundedSender<Frame>,
}

impl PushFeed {
    pub(crate) fn send(&self, message: Value) {
        self.send_raw(&message.to_string());
    }

    pub(crate) fn send_raw(&self, raw: &str) {
        let _ = self.tx.send(Ok(raw.to_string()));
    }

    pub(crate) fn fail(&self, reason: &str) {
        let _ = self
            .tx
            .send(Err(TransportError::Unavailable(reason.to_string())));
    }

    /// The client side dropped its end.
    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A canned endpoint reply: a JSON body or an HTTP status.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Json(Value),
    Status(u16),
}

impl Reply {
    fn into_result<T: serde::de::DeserializeOwned>(
        self,
        endpoint: &'static str,
    ) -> Result<T, FetchError> {
        match self {
            Reply::Json(body) => Ok(serde_json::from_value(body)?),
            Reply::Status(status) => Err(FetchError::Status { endpoint, status }),
        }
    }
}

/// Pull endpoints with fixed replies and optional latency.
pub(crate) struct FakeSource {
    metrics: Mutex<Reply>,
    status: Mutex<Reply>,
    latency: Mutex<Duration>,
    metrics_calls: AtomicUsize,
    status_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSource {
    pub(crate) fn new(metrics: Reply, status: Reply) -> Self {
        Self {
            metrics: Mutex::new(metrics),
            status: Mutex::new(status),
            latency: Mutex::new(Duration::ZERO),
            metrics_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_metrics(&self, reply: Reply) {
        *self.metrics.lock().unwrap() = reply;
    }

    pub(crate) fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub(crate) fn metrics_calls(&self) -> usize {
        self.metrics_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Most pulls ever outstanding at once.
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn respond(&self, reply: Reply) -> Reply {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        reply
    }
}

/// Decrements on drop so aborted pulls are not counted as outstanding.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TelemetrySource for FakeSource {
    async fn live_metrics(&self, _run: &RunHandle) -> Result<MetricsPayload, FetchError> {
        self.metrics_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.metrics.lock().unwrap().clone();
        self.respond(reply).await.into_result("live metrics")
    }

    async fn training_status(&self) -> Result<StatusPayload, FetchError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.status.lock().unwrap().clone();
        self.respond(reply).await.into_result("training status")
    }
}
