//! Fallback-path coverage against a mock HTTP service: bearer auth, both
//! endpoints, reply normalization, and the full session flow when the live
//! channel cannot come up.

use aurachat::protocol::{Attachments, OutboundFrame};
use aurachat::transport::{FallbackTransport, Transport, TransportEvent};
use aurachat::{ChatError, Config, Session, SessionUpdate};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("aurachat=debug")),
        )
        .with_test_writer()
        .try_init();
}

fn transport(base: &str) -> FallbackTransport {
    FallbackTransport::new(
        base,
        "alice",
        "token-abc",
        Duration::from_secs(2),
        Duration::from_secs(5),
    )
}

fn frame(message: &str) -> OutboundFrame {
    OutboundFrame {
        id: "u1".into(),
        message: message.into(),
        user_id: "alice".into(),
        context: vec![],
    }
}

#[tokio::test]
async fn chat_reply_flows_through_event_sink_with_metadata() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(header("authorization", "Bearer token-abc"))
        .and(body_partial_json(json!({
            "message": "I feel low",
            "user_id": "alice",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "I'm here with you.",
            "emotion": "sad",
            "confidence": 0.74,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let t = transport(&server.uri());
    let (tx, mut rx) = mpsc::channel(8);
    t.connect(tx).await.unwrap();
    assert_eq!(
        rx.recv().await,
        Some(TransportEvent::Opened {
            transport: "fallback-http".into()
        })
    );

    t.send(&frame("I feel low")).await.unwrap();
    match rx.recv().await {
        Some(TransportEvent::Message(inbound)) => {
            assert_eq!(inbound.content, "I'm here with you.");
            assert_eq!(inbound.emotion.as_deref(), Some("sad"));
            assert_eq!(inbound.confidence, Some(0.74));
            assert!(inbound.id.is_none());
        }
        other => panic!("expected message event, got {other:?}"),
    }
}

#[tokio::test]
async fn multimodal_request_targets_dedicated_endpoint() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/multimodal"))
        .and(header("authorization", "Bearer token-abc"))
        .and(body_partial_json(json!({
            "audio_file": "uploads/audio/alice_clip.wav",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Thanks for sharing that recording.",
            "emotion": "neutral",
            "confidence": 0.6,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let t = transport(&server.uri());
    let (tx, mut rx) = mpsc::channel(8);
    t.connect(tx).await.unwrap();
    rx.recv().await; // Opened

    let attachments = Attachments {
        audio_file: Some("uploads/audio/alice_clip.wav".into()),
        video_file: None,
    };
    t.send_multimodal(&frame("how do I sound?"), &attachments)
        .await
        .unwrap();

    match rx.recv().await {
        Some(TransportEvent::Message(inbound)) => {
            assert_eq!(inbound.content, "Thanks for sharing that recording.");
        }
        other => panic!("expected message event, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_is_a_channel_error_with_no_event() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let t = transport(&server.uri());
    let (tx, mut rx) = mpsc::channel(8);
    t.connect(tx).await.unwrap();
    rx.recv().await; // Opened

    let err = t.send(&frame("hello")).await.unwrap_err();
    assert!(matches!(err, ChatError::Channel(_)));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn reply_without_content_is_malformed() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "  "})))
        .mount(&server)
        .await;

    let t = transport(&server.uri());
    let (tx, mut rx) = mpsc::channel(8);
    t.connect(tx).await.unwrap();
    rx.recv().await;

    let err = t.send(&frame("hello")).await.unwrap_err();
    assert!(matches!(err, ChatError::MalformedPayload(_)));
}

#[tokio::test]
async fn health_check_reflects_service_status() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
        .mount(&server)
        .await;

    assert!(transport(&server.uri()).health_check().await);

    let empty = MockServer::start().await;
    assert!(!transport(&empty.uri()).health_check().await);
}

#[tokio::test]
async fn session_survives_on_fallback_when_live_channel_is_down() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(header("authorization", "Bearer token-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "I hear you.",
            "emotion": "calm",
            "confidence": 0.7,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config {
        server_url: server.uri(),
        // Nothing listens here; the live connect must fail and leave the
        // session running over the request/response path.
        ws_url: Some("ws://127.0.0.1:1".into()),
        greeting: None,
        ..Config::default()
    };
    let mut session = Session::new(&config, "alice", "token-abc");

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, ChatError::Channel(_)));

    // Fallback opened, then the live channel reported its failure.
    match session.next_update().await {
        Some(SessionUpdate::Connected { transport }) => assert_eq!(transport, "fallback-http"),
        other => panic!("expected connected update, got {other:?}"),
    }
    assert!(matches!(
        session.next_update().await,
        Some(SessionUpdate::ConnectionError { .. })
    ));

    session.submit("I feel anxious").await.unwrap();
    match session.next_update().await {
        Some(SessionUpdate::Assistant { message, crisis }) => {
            assert_eq!(message.content, "I hear you.");
            assert!(!crisis);
        }
        other => panic!("expected assistant update, got {other:?}"),
    }

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "I feel anxious");
    assert_eq!(messages[1].content, "I hear you.");

    session.close().await;
    assert!(session.next_update().await.is_none());
}
