//! Transport seam for the event channel.
//!
//! `EventChannel` only sees a stream of text frames; the WebSocket details
//! live behind `ChannelTransport` so tests can script connections and
//! failures deterministically.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Url;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::warn;

/// Frames received from one connection. The stream ends on normal closure;
/// an `Err` item reports abnormal termination.
pub type FrameStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Establish a fresh connection, yielding its inbound frames.
    async fn connect(&self) -> Result<FrameStream>;
}

/// WebSocket transport against the server's `/ws` endpoint.
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: Url) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl ChannelTransport for WsTransport {
    async fn connect(&self) -> Result<FrameStream> {
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .with_context(|| format!("Failed to connect to {}", self.url))?;

        let frames = ws_stream.filter_map(|frame| async move {
            match frame {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(_)) => {
                    // The hub only broadcasts JSON text frames
                    warn!("Dropping unexpected binary frame");
                    None
                }
                // Close lets the stream end on its own; control frames are
                // handled by the protocol layer
                Ok(_) => None,
                Err(err) => Some(Err(anyhow::Error::new(err))),
            }
        });
        Ok(frames.boxed())
    }
}
