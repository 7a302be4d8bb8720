//! Session — binds one authenticated identity to its transports and the
//! timeline, and mediates between user intent and transport events.
//!
//! Policy lives here: a submit goes over the live channel when it is open,
//! otherwise over the request/response path; a send that fails everywhere
//! yields one locally synthesized assistant-style notice through the regular
//! append path, so the timeline stays the single source of truth for what
//! the user sees.

use crate::config::Config;
use crate::error::ChatError;
use crate::protocol::{Attachments, InboundFrame, OutboundFrame};
use crate::timeline::{Message, Timeline};
use crate::transport::{
    ConnectionState, FallbackTransport, Transport, TransportEvent, WebSocketTransport,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Assistant-style notice appended when a message cannot be delivered.
pub const CONNECTIVITY_NOTICE: &str =
    "I'm sorry, I'm having trouble connecting right now. Please try again later.";

/// Reaction to one transport event, produced by [`Session::handle_event`].
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// A transport came up; `transport` names which delivery path, since
    /// both feed the same update stream.
    Connected { transport: String },
    /// An assistant message was appended. `crisis` mirrors the distinct
    /// signal from the reconciler so alert surfaces can react directly.
    Assistant { message: Message, crisis: bool },
    /// Orderly close. `notice` is the synthesized message appended when the
    /// close interrupted a pending reply.
    Disconnected { notice: Option<Message> },
    /// Channel-level failure. Surfaced as state, never as a panic.
    ConnectionError {
        reason: String,
        notice: Option<Message>,
    },
}

/// One identity's conversation: timeline, transports, pending-reply state.
pub struct Session {
    identity: String,
    timeline: Timeline,
    live: Arc<dyn Transport>,
    fallback: Arc<dyn Transport>,
    events_tx: mpsc::Sender<TransportEvent>,
    events_rx: Option<mpsc::Receiver<TransportEvent>>,
    context_window: usize,
    awaiting_reply: bool,
    closed: bool,
}

impl Session {
    /// Build a session for `identity` against the configured service.
    /// `token` is the opaque bearer credential for the fallback path.
    pub fn new(config: &Config, identity: &str, token: &str) -> Self {
        let live = Arc::new(WebSocketTransport::new(config.ws_chat_url(identity)));
        let fallback = Arc::new(FallbackTransport::new(
            &config.server_url,
            identity,
            token,
            config.connect_timeout(),
            config.request_timeout(),
        ));

        let mut session = Self::with_transports(identity, live, fallback, config.context_window);
        if let Some(greeting) = config.greeting_text() {
            session.timeline.seed_greeting(greeting);
        }
        session
    }

    /// Wire a session onto explicit transports. Used by tests and embedders
    /// that bring their own delivery paths.
    pub fn with_transports(
        identity: &str,
        live: Arc<dyn Transport>,
        fallback: Arc<dyn Transport>,
        context_window: usize,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(32);
        Self {
            identity: identity.to_string(),
            timeline: Timeline::new(),
            live,
            fallback,
            events_tx,
            events_rx: Some(events_rx),
            context_window,
            awaiting_reply: false,
            closed: false,
        }
    }

    /// Bring up both paths. The fallback registers immediately; the live
    /// channel may fail, in which case the session stays usable over the
    /// fallback and the error is surfaced to the caller.
    pub async fn connect(&self) -> Result<(), ChatError> {
        if self.closed {
            return Err(ChatError::Channel("session is closed".into()));
        }
        self.fallback.connect(self.events_tx.clone()).await?;
        self.live.connect(self.events_tx.clone()).await
    }

    /// Append the user's message and deliver it with a trailing context
    /// window: live channel first, request/response path when the live
    /// channel is unavailable. Returns the appended message.
    pub async fn submit(&mut self, content: &str) -> Result<Message, ChatError> {
        let (frame, message) = self.prepare_outbound(content)?;

        if self.live.is_open() {
            match self.live.send(&frame).await {
                Ok(()) => {
                    self.awaiting_reply = true;
                    return Ok(message);
                }
                Err(e) => {
                    tracing::warn!("live send failed, retrying over fallback: {e}");
                }
            }
        }

        match self.fallback.send(&frame).await {
            Ok(()) => {
                self.awaiting_reply = true;
                Ok(message)
            }
            Err(e) => {
                self.append_delivery_notice();
                Err(e)
            }
        }
    }

    /// Deliver a message carrying opaque media references. Media goes over
    /// the multimodal request/response endpoint regardless of live-channel
    /// state; the live protocol has no frame for it.
    pub async fn submit_multimodal(
        &mut self,
        content: &str,
        attachments: Attachments,
    ) -> Result<Message, ChatError> {
        if attachments.is_empty() {
            // No media to carry; the plain path serves this message.
            return self.submit(content).await;
        }
        let (frame, message) = self.prepare_outbound(content)?;

        match self.fallback.send_multimodal(&frame, &attachments).await {
            Ok(()) => {
                self.awaiting_reply = true;
                Ok(message)
            }
            Err(e) => {
                self.append_delivery_notice();
                Err(e)
            }
        }
    }

    /// React to one transport event. Pure state step — no I/O — so the
    /// reconciliation logic stays testable without a network.
    pub fn handle_event(&mut self, event: TransportEvent) -> SessionUpdate {
        match event {
            TransportEvent::Opened { transport } => SessionUpdate::Connected { transport },
            TransportEvent::Message(frame) => {
                self.awaiting_reply = false;
                let appended = self.timeline.append_remote(frame);
                SessionUpdate::Assistant {
                    message: appended.message,
                    crisis: appended.crisis,
                }
            }
            TransportEvent::Closed => SessionUpdate::Disconnected {
                notice: self.interrupt_pending(),
            },
            TransportEvent::Errored(reason) => {
                tracing::warn!(identity = %self.identity, "channel error: {reason}");
                SessionUpdate::ConnectionError {
                    reason,
                    notice: self.interrupt_pending(),
                }
            }
        }
    }

    /// Await the next transport event and feed it through
    /// [`handle_event`](Self::handle_event). `None` once the session is
    /// closed and drained.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        let event = self.events_rx.as_mut()?.recv().await?;
        Some(self.handle_event(event))
    }

    /// Tear down both transports and detach the event stream. Idempotent;
    /// pending state never outlives the session.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.awaiting_reply = false;
        self.live.close().await;
        self.fallback.close().await;
        self.events_rx.take();
        tracing::info!(identity = %self.identity, "session closed");
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn messages(&self) -> &[Message] {
        self.timeline.messages()
    }

    /// Live-channel state; drives the user-visible connectivity indicator.
    pub fn connection_state(&self) -> ConnectionState {
        self.live.state()
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Capture the context window, then append. Ordering matters: the window
    /// must not include the message being composed.
    fn prepare_outbound(&mut self, content: &str) -> Result<(OutboundFrame, Message), ChatError> {
        if self.closed {
            return Err(ChatError::Channel("session is closed".into()));
        }
        let context = self.timeline.context_window(self.context_window);
        let message = self.timeline.append_local(content)?;
        let frame = OutboundFrame {
            id: message.id.clone(),
            message: message.content.clone(),
            user_id: self.identity.clone(),
            context,
        };
        Ok((frame, message))
    }

    fn append_delivery_notice(&mut self) -> Message {
        self.timeline
            .append_remote(InboundFrame::local_notice(CONNECTIVITY_NOTICE))
            .message
    }

    /// Clear a pending reply interrupted by close/error and surface the
    /// recoverable failure in the timeline.
    fn interrupt_pending(&mut self) -> Option<Message> {
        if !self.awaiting_reply {
            return None;
        }
        self.awaiting_reply = false;
        Some(self.append_delivery_notice())
    }
}
