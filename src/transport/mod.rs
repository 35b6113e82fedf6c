//! Seams to the training backend.
//!
//! The monitor is generic over these traits so the push channel and the pull
//! endpoints can be swapped for in-memory fakes.

use std::future::Future;

use futures_util::stream::BoxStream;

use crate::error::{FetchError, TransportError};
use crate::snapshot::RunHandle;
use crate::wire::{MetricsPayload, StatusPayload};

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "ws")]
mod ws;

#[cfg(feature = "http")]
pub use http::HttpSource;
#[cfg(feature = "ws")]
pub use ws::WsTransport;

/// Raw text messages from an open push channel, in arrival order.
///
/// The stream ending means the server closed the channel; an `Err` item is a
/// transport failure and ends the session.
pub type PushStream = BoxStream<'static, Result<String, TransportError>>;

pub trait PushTransport: Send + Sync + 'static {
    /// Opens the push channel for `run`. Dropping the returned stream closes it.
    fn connect(
        &self,
        run: &RunHandle,
    ) -> impl Future<Output = Result<PushStream, TransportError>> + Send;
}

pub trait TelemetrySource: Send + Sync + 'static {
    /// Per-run metrics (endpoint A).
    fn live_metrics(
        &self,
        run: &RunHandle,
    ) -> impl Future<Output = Result<MetricsPayload, FetchError>> + Send;

    /// General training status (endpoint B).
    fn training_status(&self) -> impl Future<Output = Result<StatusPayload, FetchError>> + Send;
}
