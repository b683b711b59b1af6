//! # voxa-client
//!
//! The session client: ties the dispatch layer and the avatar handshake to
//! an injected transport.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `transport` | `Transport` and `CredentialProvider` seams (WebSocket stays outside) |
//! | `session` | Inbound reader loop, typed dispatch, ordered update stream, command send, avatar connect |
//!
//! ## Data Flow
//!
//! Transport text → `RawFrame` → registry decode → handler-table fan-out →
//! `SessionUpdate` forwarded in wire order on the update stream. The avatar
//! handshake rides the same paths: its offer goes out as a
//! `session.avatar.connect` command, its answer comes back through a
//! `session.avatar.connecting` subscriber.

#![deny(unsafe_code)]

pub mod session;
pub mod transport;

pub use session::{ClientError, SessionClient};
pub use transport::{CredentialError, CredentialProvider, Transport, TransportError};
