//! Live channel — a persistent WebSocket to the companion service, one per
//! authenticated identity.
//!
//! The transport is a thin state holder: it reports failures as state
//! transitions plus emitted events and never retries on its own.

use super::{ConnectionState, Transport, TransportEvent};
use crate::error::ChatError;
use crate::protocol::{self, OutboundFrame};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// WebSocket implementation of the [`Transport`] trait.
pub struct WebSocketTransport {
    url: String,
    state: Arc<Mutex<ConnectionState>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    channel_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl WebSocketTransport {
    /// `url` is the full per-identity endpoint, e.g.
    /// `ws://host:8000/ws/chat/alice`.
    pub fn new(url: String) -> Self {
        Self {
            url,
            state: Arc::new(Mutex::new(ConnectionState::Idle)),
            outbound: Mutex::new(None),
            channel_task: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn name(&self) -> &str {
        "websocket"
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    async fn connect(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), ChatError> {
        {
            let mut state = self.state.lock();
            match *state {
                ConnectionState::Connecting | ConnectionState::Open => {
                    tracing::debug!(url = %self.url, "connect ignored: channel already live");
                    return Ok(());
                }
                _ => *state = ConnectionState::Connecting,
            }
        }

        tracing::info!(url = %self.url, "connecting live channel");
        let ws_stream = match connect_async(&self.url).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                *self.state.lock() = ConnectionState::Errored;
                let reason = e.to_string();
                let _ = events.send(TransportEvent::Errored(reason.clone())).await;
                return Err(ChatError::Channel(reason));
            }
        };

        let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
        *self.outbound.lock() = Some(out_tx);
        *self.state.lock() = ConnectionState::Open;
        let _ = events
            .send(TransportEvent::Opened {
                transport: self.name().to_string(),
            })
            .await;
        tracing::info!(url = %self.url, "live channel open");

        let state = self.state.clone();
        let task = tokio::spawn(run_channel(ws_stream, out_rx, events, state));
        if let Some(old) = self.channel_task.lock().replace(task) {
            old.abort();
        }
        Ok(())
    }

    async fn send(&self, frame: &OutboundFrame) -> Result<(), ChatError> {
        let state = self.state();
        if state != ConnectionState::Open {
            return Err(ChatError::TransportUnavailable(format!(
                "live channel is {}",
                state.as_str()
            )));
        }

        let text = serde_json::to_string(frame)
            .map_err(|e| ChatError::Channel(format!("frame serialization failed: {e}")))?;

        let sender = self.outbound.lock().clone();
        match sender {
            Some(tx) => tx
                .send(text)
                .map_err(|_| ChatError::Channel("channel task is gone".into())),
            None => Err(ChatError::TransportUnavailable(
                "live channel has no writer".into(),
            )),
        }
    }

    async fn close(&self) {
        let was_closed = {
            let mut state = self.state.lock();
            let was_closed = *state == ConnectionState::Closed;
            *state = ConnectionState::Closed;
            was_closed
        };

        // Reap even when the server closed first: the reader task flips the
        // state but leaves the writer and the task itself behind.
        self.outbound.lock().take();
        let task = self.channel_task.lock().take();
        if let Some(task) = task {
            task.abort();
            let _ = task.await;
        }
        if !was_closed {
            tracing::info!(url = %self.url, "live channel closed");
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(task) = self.channel_task.lock().take() {
            task.abort();
        }
    }
}

/// Pump the WebSocket in both directions until it ends. Inbound text frames
/// are parsed at this boundary; malformed ones are logged and dropped so they
/// never reach the timeline or kill the task.
async fn run_channel(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut out_rx: mpsc::UnboundedReceiver<String>,
    events: mpsc::Sender<TransportEvent>,
    state: Arc<Mutex<ConnectionState>>,
) {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            frame = out_rx.recv() => match frame {
                Some(text) => {
                    if let Err(e) = write.send(Message::text(text)).await {
                        tracing::warn!("live channel write failed: {e}");
                        *state.lock() = ConnectionState::Errored;
                        let _ = events.send(TransportEvent::Errored(e.to_string())).await;
                        break;
                    }
                }
                // The transport dropped the writer on close.
                None => break,
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => match protocol::parse_inbound(&text) {
                    Ok(inbound) => {
                        if events.send(TransportEvent::Message(inbound)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!("dropping malformed frame: {e}"),
                },
                Some(Ok(Message::Ping(data))) => {
                    if write.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    tracing::info!("live channel closed by server");
                    *state.lock() = ConnectionState::Closed;
                    let _ = events.send(TransportEvent::Closed).await;
                    break;
                }
                Some(Err(e)) => {
                    tracing::warn!("live channel error: {e}");
                    *state.lock() = ConnectionState::Errored;
                    let _ = events.send(TransportEvent::Errored(e.to_string())).await;
                    break;
                }
                Some(Ok(_)) => {}
                None => {
                    // Stream ended without a close frame: abrupt disconnect.
                    tracing::warn!("live channel stream ended abruptly");
                    *state.lock() = ConnectionState::Errored;
                    let _ = events
                        .send(TransportEvent::Errored("connection lost".into()))
                        .await;
                    break;
                }
            },
        }
    }
}
