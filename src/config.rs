//! Client configuration — service endpoints, context-window size, timeouts.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Greeting the original companion seeds the timeline with.
pub const DEFAULT_GREETING: &str =
    "Hi! I'm Aura, your mental wellness companion. How are you feeling today?";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the companion service (HTTP endpoints).
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Explicit WebSocket base URL. When unset it is derived from
    /// `server_url` by swapping the scheme (http → ws, https → wss).
    #[serde(default)]
    pub ws_url: Option<String>,

    /// How many trailing messages accompany each outbound message.
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Companion greeting seeded into a fresh timeline. Set to an empty
    /// string to disable seeding.
    #[serde(default = "default_greeting")]
    pub greeting: Option<String>,
}

fn default_server_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_context_window() -> usize {
    5
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    120
}

fn default_greeting() -> Option<String> {
    Some(DEFAULT_GREETING.to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            ws_url: None,
            context_window: default_context_window(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            greeting: default_greeting(),
        }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid config in {}", path.display()))
    }

    /// Per-identity live channel endpoint.
    pub fn ws_chat_url(&self, identity: &str) -> String {
        let base = match &self.ws_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => derive_ws_base(&self.server_url),
        };
        format!("{base}/ws/chat/{identity}")
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Greeting to seed, filtering out an explicit empty string.
    pub fn greeting_text(&self) -> Option<&str> {
        self.greeting.as_deref().filter(|g| !g.trim().is_empty())
    }
}

fn derive_ws_base(server_url: &str) -> String {
    let trimmed = server_url.trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        trimmed.to_string()
    }
}
