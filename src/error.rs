//! Error taxonomy for the chat core.
//!
//! Parsing and validation failures are absorbed at the boundary where data
//! enters the core; channel failures surface as session state plus an emitted
//! lifecycle event, never a panic out of `send`.

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Outbound content failed local validation. Nothing was sent or appended.
    #[error("invalid message: {0}")]
    Validation(String),

    /// The live channel is not open at send time. Recoverable: callers
    /// re-issue the request through the request/response path.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Inbound data that cannot become a message. Dropped and logged at the
    /// boundary; never forwarded into the timeline.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Underlying connection failure. Transitions the session to errored.
    #[error("channel error: {0}")]
    Channel(String),
}

impl ChatError {
    /// Whether the caller can recover by retrying over another path.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ChatError::TransportUnavailable(_) | ChatError::Channel(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_detail() {
        let err = ChatError::Validation("empty content".into());
        assert_eq!(err.to_string(), "invalid message: empty content");

        let err = ChatError::TransportUnavailable("state is connecting".into());
        assert!(err.to_string().starts_with("transport unavailable"));
    }

    #[test]
    fn transport_and_channel_errors_are_recoverable() {
        assert!(ChatError::TransportUnavailable("closed".into()).is_recoverable());
        assert!(ChatError::Channel("reset by peer".into()).is_recoverable());
        assert!(!ChatError::Validation("empty".into()).is_recoverable());
        assert!(!ChatError::MalformedPayload("not json".into()).is_recoverable());
    }
}
