//! Timeline reconciler — the canonical, append-only message sequence.
//!
//! The timeline is owned exclusively by the session; transports never touch
//! it, they only emit events that get appended here. Appending is the only
//! mutation path and past entries are never reordered or edited.

use crate::error::ChatError;
use crate::protocol::{ContextEntry, InboundFrame};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a message. Serialized as `user`/`bot` to match the service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    #[serde(rename = "bot")]
    Assistant,
}

/// One unit of the timeline. Never mutated after append; edits would produce
/// a new message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub origin: Origin,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Derived metadata from the remote classifier. Assistant messages only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crisis_flag: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crisis_type: Option<String>,
}

impl Message {
    pub fn is_crisis(&self) -> bool {
        self.crisis_flag == Some(true)
    }
}

/// Outcome of appending a remote frame. The crisis signal is returned here so
/// alert surfaces never have to scan the timeline for it.
#[derive(Debug, Clone)]
pub struct RemoteAppend {
    pub message: Message,
    pub crisis: bool,
}

/// Ordered, append-only message sequence for one session.
#[derive(Debug, Default)]
pub struct Timeline {
    messages: Vec<Message>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the timeline with the companion greeting shown before any
    /// exchange. Goes through the same append machinery as real assistant
    /// messages, just without classifier metadata.
    pub fn seed_greeting(&mut self, text: &str) {
        self.messages.push(Message {
            id: Uuid::new_v4().to_string(),
            origin: Origin::Assistant,
            content: text.to_string(),
            timestamp: Utc::now(),
            emotion_label: None,
            confidence: None,
            crisis_flag: None,
            crisis_type: None,
        });
    }

    /// Append a user-originated message. Rejects empty or whitespace-only
    /// content without mutating the timeline. Returns the constructed message
    /// so the caller can build the outbound payload from it.
    pub fn append_local(&mut self, content: &str) -> Result<Message, ChatError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::Validation("message content is empty".into()));
        }

        let message = Message {
            id: Uuid::new_v4().to_string(),
            origin: Origin::User,
            content: content.to_string(),
            timestamp: Utc::now(),
            emotion_label: None,
            confidence: None,
            crisis_flag: None,
            crisis_type: None,
        };
        self.messages.push(message.clone());
        Ok(message)
    }

    /// Append an assistant-originated message from a transport-delivered
    /// frame. Uses the service-provided id when present, mints one otherwise.
    /// The inbound `timestamp` string is ignored for ordering; arrival order
    /// rules the timeline.
    pub fn append_remote(&mut self, frame: InboundFrame) -> RemoteAppend {
        let crisis = frame.crisis_detected.unwrap_or(false);
        let message = Message {
            id: frame
                .id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            origin: Origin::Assistant,
            content: frame.content,
            timestamp: Utc::now(),
            emotion_label: frame.emotion,
            confidence: frame.confidence,
            crisis_flag: frame.crisis_detected,
            crisis_type: frame.crisis_type,
        };
        self.messages.push(message.clone());

        if crisis {
            tracing::warn!(id = %message.id, "crisis flagged on incoming message");
        }

        RemoteAppend { message, crisis }
    }

    /// The last `n` messages as `{origin, content}` pairs, oldest first.
    /// Pure read: no metadata leaks into the outbound context and the
    /// timeline is untouched.
    pub fn context_window(&self, n: usize) -> Vec<ContextEntry> {
        let start = self.messages.len().saturating_sub(n);
        self.messages[start..]
            .iter()
            .map(|m| ContextEntry {
                origin: m.origin,
                content: m.content.clone(),
            })
            .collect()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
