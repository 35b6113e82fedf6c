use std::sync::Arc;

use futures_util::{future, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::debug;

use super::{PushStream, PushTransport};
use crate::config::MonitorConfig;
use crate::error::TransportError;
use crate::snapshot::RunHandle;

/// WebSocket push channel at `/ws/training?runId=<id>`.
#[derive(Debug, Clone)]
pub struct WsTransport {
    config: Arc<MonitorConfig>,
}

impl WsTransport {
    pub fn new(config: Arc<MonitorConfig>) -> Self {
        Self { config }
    }
}

impl PushTransport for WsTransport {
    async fn connect(&self, run: &RunHandle) -> Result<PushStream, TransportError> {
        let url = self.config.push_endpoint(run)?;
        debug!("Opening push channel {}", url);
        let (socket, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;

        let messages = socket.filter_map(|frame| {
            future::ready(match frame {
                Ok(Message::Text(text)) => Some(Ok(text.to_string())),
                Ok(Message::Binary(bytes)) => Some(
                    String::from_utf8(bytes.to_vec())
                        .map_err(|_| TransportError::Unavailable("non UTF-8 binary frame".into())),
                ),
                // Control frames are answered by tungstenite itself.
                Ok(_) => None,
                // A clean close surfaces as an error on some paths; treat it as end of stream.
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => None,
                Err(err) => Some(Err(err.into())),
            })
        });
        Ok(messages.boxed())
    }
}
