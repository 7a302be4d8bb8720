//! Wire frames exchanged with the companion service.
//!
//! The live channel speaks JSON text frames; the fallback path posts JSON
//! bodies to `/chat` and `/chat/multimodal`. Both reply shapes normalize into
//! [`InboundFrame`] so the reconciler consumes one uniform stream.

use crate::error::ChatError;
use crate::timeline::Origin;
use serde::{Deserialize, Serialize};

/// One `{origin, content}` pair of the outbound context window. The wire
/// field is named `type` and nothing else ever leaks into it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextEntry {
    #[serde(rename = "type")]
    pub origin: Origin,
    pub content: String,
}

/// Outbound live-channel frame: the new message plus its trailing context.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutboundFrame {
    pub id: String,
    pub message: String,
    pub user_id: String,
    pub context: Vec<ContextEntry>,
}

/// Opaque references to previously uploaded media, forwarded as-is to the
/// multimodal endpoint. Uploading itself is not this crate's concern.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attachments {
    pub audio_file: Option<String>,
    pub video_file: Option<String>,
}

impl Attachments {
    pub fn is_empty(&self) -> bool {
        self.audio_file.is_none() && self.video_file.is_none()
    }
}

/// Inbound frame from either transport. `content` is the only required
/// field; everything else is classifier metadata the service may omit.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InboundFrame {
    #[serde(default)]
    pub id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub crisis_detected: Option<bool>,
    #[serde(default)]
    pub crisis_type: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl InboundFrame {
    /// A locally synthesized assistant-style frame, used to surface a send
    /// failure through the regular append path.
    pub fn local_notice(content: &str) -> Self {
        Self {
            id: None,
            content: content.to_string(),
            emotion: None,
            confidence: None,
            crisis_detected: None,
            crisis_type: None,
            timestamp: None,
        }
    }
}

/// Body for the plain-text fallback endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: String,
    pub context: Vec<ContextEntry>,
}

/// Body for the multimodal fallback endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MultimodalChatRequest {
    pub message: String,
    pub user_id: String,
    pub context: Vec<ContextEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_file: Option<String>,
}

/// Reply body from both fallback endpoints.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub crisis_detected: Option<bool>,
    #[serde(default)]
    pub crisis_type: Option<String>,
}

impl From<ChatResponse> for InboundFrame {
    fn from(resp: ChatResponse) -> Self {
        InboundFrame {
            id: None,
            content: resp.response,
            emotion: resp.emotion,
            confidence: resp.confidence,
            crisis_detected: resp.crisis_detected,
            crisis_type: resp.crisis_type,
            timestamp: None,
        }
    }
}

/// Parse a raw live-channel text frame. Frames that are not JSON, or that
/// parse without a non-empty `content`, are malformed: callers drop and log
/// them, never forward them as a message.
pub fn parse_inbound(raw: &str) -> Result<InboundFrame, ChatError> {
    let frame: InboundFrame = serde_json::from_str(raw)
        .map_err(|e| ChatError::MalformedPayload(e.to_string()))?;
    if frame.content.trim().is_empty() {
        return Err(ChatError::MalformedPayload("empty content field".into()));
    }
    Ok(frame)
}
