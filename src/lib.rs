#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::uninlined_format_args
)]

//! Session transport and timeline core for the Aura wellness-companion
//! client.
//!
//! A [`Session`] binds one authenticated identity to a live WebSocket channel
//! with an authenticated HTTP fallback, and owns the append-only message
//! [`Timeline`]. Rendering, auth, and media uploads live outside this crate;
//! it consumes an opaque identity and bearer credential and emits
//! [`SessionUpdate`]s.

pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod timeline;
pub mod transport;

pub use config::Config;
pub use error::ChatError;
pub use protocol::{Attachments, InboundFrame, OutboundFrame};
pub use session::{CONNECTIVITY_NOTICE, Session, SessionUpdate};
pub use timeline::{Message, Origin, RemoteAppend, Timeline};
pub use transport::{
    ConnectionState, FallbackTransport, Transport, TransportEvent, WebSocketTransport,
};
