//! Resilient event channel.
//!
//! Maintains a best-effort always-on stream of server-pushed status
//! updates. After any termination - normal closure, transport error, or a
//! failed connection attempt - a brand-new connection is established after
//! a fixed delay, indefinitely. The consumer only ever sees parsed
//! messages; connection failures are logged, never surfaced.
//!
//! Messages sent by the server while disconnected are lost; consumers
//! resynchronize through the idempotent REST fetches after reconnect.

pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::models::ChannelMessage;

pub use transport::{ChannelTransport, FrameStream, WsTransport};

/// Fixed delay before re-establishing a terminated connection.
/// Constant on purpose: no exponential backoff, no jitter, no retry limit.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Lifecycle of the current connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    /// The server closed the connection normally
    Closed,
    /// The connection attempt or an open connection failed
    Errored,
}

/// Consumer callback invoked for every frame that parses successfully.
pub type MessageHandler = Arc<dyn Fn(ChannelMessage) + Send + Sync>;

/// Handle to a running event channel.
///
/// Dropping the handle cancels the connection task; `close` additionally
/// waits for it to wind down, so tests and teardown do not leak timers or
/// sockets.
pub struct ChannelHandle {
    cancel: CancellationToken,
    state_rx: watch::Receiver<ChannelState>,
    task: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    /// Observe state transitions of the underlying connection.
    pub fn state(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    /// Stop the channel permanently: cancels the reconnect loop and waits
    /// for the connection task to finish.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct EventChannel;

impl EventChannel {
    /// Open the channel against the config's `/ws` endpoint.
    pub fn open(config: &ClientConfig, on_message: MessageHandler) -> Result<ChannelHandle> {
        let transport = Arc::new(WsTransport::new(config.ws_url()?));
        Ok(Self::open_with(transport, on_message))
    }

    /// Open the channel over an explicit transport.
    ///
    /// Does not wait for the connection to complete; progress is reported
    /// through the handle's state receiver.
    pub fn open_with(
        transport: Arc<dyn ChannelTransport>,
        on_message: MessageHandler,
    ) -> ChannelHandle {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(ChannelState::Connecting);
        let task = tokio::spawn(Self::run(transport, on_message, state_tx, cancel.clone()));
        ChannelHandle {
            cancel,
            state_rx,
            task: Some(task),
        }
    }

    async fn run(
        transport: Arc<dyn ChannelTransport>,
        on_message: MessageHandler,
        state_tx: watch::Sender<ChannelState>,
        cancel: CancellationToken,
    ) {
        use futures::StreamExt;

        loop {
            let _ = state_tx.send(ChannelState::Connecting);
            let connected = tokio::select! {
                _ = cancel.cancelled() => return,
                result = transport.connect() => result,
            };

            match connected {
                Ok(mut frames) => {
                    debug!("Event channel connected");
                    let _ = state_tx.send(ChannelState::Open);
                    let end_state = loop {
                        tokio::select! {
                            _ = cancel.cancelled() => return,
                            frame = frames.next() => match frame {
                                Some(Ok(text)) => Self::deliver(&text, &on_message),
                                Some(Err(err)) => {
                                    warn!(error = %err, "Event channel transport error");
                                    break ChannelState::Errored;
                                }
                                None => {
                                    debug!("Event channel closed by server");
                                    break ChannelState::Closed;
                                }
                            }
                        }
                    };
                    let _ = state_tx.send(end_state);
                }
                Err(err) => {
                    warn!(error = %err, "Failed to connect event channel");
                    let _ = state_tx.send(ChannelState::Errored);
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
    }

    /// Parse one frame and hand it to the consumer. A frame that does not
    /// parse is dropped; it never terminates the connection or the
    /// callback pathway.
    fn deliver(text: &str, on_message: &MessageHandler) {
        match serde_json::from_str::<ChannelMessage>(text) {
            Ok(message) => on_message(message),
            Err(err) => warn!(error = %err, "Dropping unparseable channel frame"),
        }
    }
}
