//! Fallback path — authenticated HTTP request/response to the companion
//! service, used when the live channel is not open.
//!
//! Replies convert into the same inbound frames the live channel produces
//! and flow through the same event sink, so the reconciler never cares which
//! path delivered a message.

use super::{ConnectionState, Transport, TransportEvent};
use crate::error::ChatError;
use crate::protocol::{Attachments, ChatRequest, ChatResponse, MultimodalChatRequest, OutboundFrame};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// HTTP implementation of the [`Transport`] trait. The bearer credential is
/// opaque to the core; it comes from the external auth collaborator.
pub struct FallbackTransport {
    base_url: String,
    identity: String,
    token: String,
    client: reqwest::Client,
    state: Mutex<ConnectionState>,
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
}

impl FallbackTransport {
    pub fn new(
        base_url: &str,
        identity: &str,
        token: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            identity: identity.to_string(),
            token: token.to_string(),
            client: reqwest::Client::builder()
                .timeout(request_timeout)
                .connect_timeout(connect_timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            state: Mutex::new(ConnectionState::Idle),
            events: Mutex::new(None),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn require_open(&self) -> Result<(), ChatError> {
        let state = self.state();
        if state != ConnectionState::Open {
            return Err(ChatError::TransportUnavailable(format!(
                "fallback path is {}",
                state.as_str()
            )));
        }
        Ok(())
    }

    /// POST a body, check the status, and surface the reply through the
    /// event sink as a regular inbound frame.
    async fn post_chat<B: serde::Serialize + Sync>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<(), ChatError> {
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| ChatError::Channel(format!("request to {url} failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(ChatError::Channel(format!(
                "chat request failed ({status}): {detail}"
            )));
        }

        let reply: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ChatError::MalformedPayload(e.to_string()))?;
        if reply.response.trim().is_empty() {
            return Err(ChatError::MalformedPayload(
                "empty response field".into(),
            ));
        }

        let events = self.events.lock().clone();
        match events {
            Some(events) => {
                let _ = events.send(TransportEvent::Message(reply.into())).await;
                Ok(())
            }
            None => Err(ChatError::TransportUnavailable(
                "fallback path has no event sink".into(),
            )),
        }
    }
}

#[async_trait]
impl Transport for FallbackTransport {
    fn name(&self) -> &str {
        "fallback-http"
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Request/response needs no handshake: registering the event sink is the
    /// whole connect. Idempotent.
    async fn connect(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), ChatError> {
        {
            let mut state = self.state.lock();
            if *state == ConnectionState::Open {
                return Ok(());
            }
            *state = ConnectionState::Open;
        }
        let _ = events
            .send(TransportEvent::Opened {
                transport: self.name().to_string(),
            })
            .await;
        *self.events.lock() = Some(events);
        tracing::debug!(base = %self.base_url, "fallback path ready");
        Ok(())
    }

    async fn send(&self, frame: &OutboundFrame) -> Result<(), ChatError> {
        self.require_open()?;
        let body = ChatRequest {
            message: frame.message.clone(),
            user_id: self.identity.clone(),
            context: frame.context.clone(),
        };
        tracing::debug!(id = %frame.id, "delivering over fallback path");
        self.post_chat(&self.endpoint("/chat"), &body).await
    }

    async fn send_multimodal(
        &self,
        frame: &OutboundFrame,
        attachments: &Attachments,
    ) -> Result<(), ChatError> {
        self.require_open()?;
        let body = MultimodalChatRequest {
            message: frame.message.clone(),
            user_id: self.identity.clone(),
            context: frame.context.clone(),
            audio_file: attachments.audio_file.clone(),
            video_file: attachments.video_file.clone(),
        };
        tracing::debug!(id = %frame.id, "delivering over multimodal fallback path");
        self.post_chat(&self.endpoint("/chat/multimodal"), &body)
            .await
    }

    async fn close(&self) {
        *self.state.lock() = ConnectionState::Closed;
        self.events.lock().take();
    }

    async fn health_check(&self) -> bool {
        match self.client.get(self.endpoint("/health")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> FallbackTransport {
        FallbackTransport::new(
            "http://localhost:8000/",
            "alice",
            "token-abc",
            Duration::from_secs(1),
            Duration::from_secs(2),
        )
    }

    fn frame() -> OutboundFrame {
        OutboundFrame {
            id: "u1".into(),
            message: "hello".into(),
            user_id: "alice".into(),
            context: vec![],
        }
    }

    #[test]
    fn trims_trailing_slash_from_base_url() {
        let t = transport();
        assert_eq!(t.endpoint("/chat"), "http://localhost:8000/chat");
        assert_eq!(
            t.endpoint("/chat/multimodal"),
            "http://localhost:8000/chat/multimodal"
        );
    }

    #[tokio::test]
    async fn send_before_connect_is_unavailable() {
        let t = transport();
        let err = t.send(&frame()).await.unwrap_err();
        assert!(matches!(err, ChatError::TransportUnavailable(_)));
        assert_eq!(t.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn connect_is_idempotent_and_emits_opened_once() {
        let t = transport();
        let (tx, mut rx) = mpsc::channel(4);
        t.connect(tx.clone()).await.unwrap();
        t.connect(tx).await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(TransportEvent::Opened {
                transport: "fallback-http".into()
            })
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(t.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn close_detaches_event_sink() {
        let t = transport();
        let (tx, _rx) = mpsc::channel(4);
        t.connect(tx).await.unwrap();
        t.close().await;
        assert_eq!(t.state(), ConnectionState::Closed);
        assert!(t.events.lock().is_none());

        let err = t.send(&frame()).await.unwrap_err();
        assert!(matches!(err, ChatError::TransportUnavailable(_)));
    }
}
