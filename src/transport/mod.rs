//! Session transport — one live channel per authenticated identity, with a
//! uniform send/receive contract across both delivery paths.
//!
//! Two implementations share the [`Transport`] trait: the WebSocket live
//! channel and the authenticated HTTP fallback. Which one handles a given
//! send is the session's policy decision; the transports themselves never
//! retry or fall back on their own.

use crate::error::ChatError;
use crate::protocol::{Attachments, InboundFrame, OutboundFrame};
use async_trait::async_trait;
use tokio::sync::mpsc;

pub mod fallback;
pub mod websocket;

pub use fallback::FallbackTransport;
pub use websocket::WebSocketTransport;

/// Connection lifecycle: Idle → Connecting → {Open, Errored};
/// Open → Closed (explicit) or Open → Errored (abrupt loss).
/// No state auto-retries; retry policy lives with the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
    Errored,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
            ConnectionState::Errored => "errored",
        }
    }
}

/// One discrete occurrence on a transport, delivered through the mpsc sender
/// registered at `connect`. Channel failures arrive here, never as a panic
/// out of `send`.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The emitting transport came up. Both transports share one sink, so
    /// the event carries the transport's name to keep them apart.
    Opened { transport: String },
    Message(InboundFrame),
    Closed,
    Errored(String),
}

/// Uniform contract over the live channel and the request/response path.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    fn state(&self) -> ConnectionState;

    fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Establish the channel and register the event sink. Idempotent: calling
    /// again while connecting or open must not open a second channel.
    async fn connect(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), ChatError>;

    /// Deliver one outbound frame. Fails fast with `TransportUnavailable`
    /// when the channel is not open — no silent queueing, no state mutation.
    async fn send(&self, frame: &OutboundFrame) -> Result<(), ChatError>;

    /// Deliver a frame with opaque media references. Only the
    /// request/response path can carry these.
    async fn send_multimodal(
        &self,
        _frame: &OutboundFrame,
        _attachments: &Attachments,
    ) -> Result<(), ChatError> {
        Err(ChatError::TransportUnavailable(
            "multimodal delivery requires the request/response path".into(),
        ))
    }

    /// Release the channel. Safe to call multiple times; after close no
    /// further events are delivered.
    async fn close(&self);

    /// Whether the transport looks able to deliver right now.
    async fn health_check(&self) -> bool {
        self.is_open()
    }
}
