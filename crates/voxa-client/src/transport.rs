//! Seams for the collaborators this runtime consumes but does not own.
//!
//! The WebSocket itself (connect, frame bytes, reconnect) lives outside
//! this workspace; the client sees only an outbound text sink plus an
//! inbound text channel handed to the reader loop. Credential acquisition
//! and refresh likewise stay outside — concrete transports pull a token at
//! connect time through [`CredentialProvider`].

use async_trait::async_trait;
use thiserror::Error;

/// Failure to hand a message to the transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying connection is gone.
    #[error("transport closed")]
    Closed,

    /// Transport-specific failure.
    #[error("transport error: {0}")]
    Other(String),
}

/// Outbound half of the session protocol transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one JSON text frame.
    async fn send(&self, text: String) -> Result<(), TransportError>;
}

/// Failure to produce a credential.
#[derive(Debug, Error)]
#[error("credential error: {0}")]
pub struct CredentialError(pub String);

/// Supplies the bearer token or API key a concrete transport authenticates
/// with.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// A token currently valid for the service.
    async fn bearer_token(&self) -> Result<String, CredentialError>;
}
