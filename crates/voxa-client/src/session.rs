//! The session client.
//!
//! One [`SessionClient`] serves one active session: it reads inbound text
//! frames, decodes them through the registry, fans the typed events out
//! through the handler table, and forwards exactly one [`SessionUpdate`]
//! per frame — in wire order — on a bounded update stream. Subscriber
//! failures are logged and never stall the reader loop; a slow update
//! consumer exerts backpressure through the bounded channel rather than
//! reordering anything.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use voxa_avatar::handshake::SignalSink;
use voxa_avatar::{AvatarHandshake, HandshakeConfig, HandshakeError, MediaEngine};
use voxa_core::command::ClientCommand;
use voxa_core::events::{ServerEvent, discriminators};
use voxa_core::frame::RawFrame;
use voxa_core::update::SessionUpdate;
use voxa_dispatch::{HandlerTable, Normalizer, Registry};

use crate::transport::{Transport, TransportError};

/// Failure surfaced by the session client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A command failed to serialize.
    #[error("serialize command: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The transport rejected a send.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An avatar handshake attempt failed.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
}

/// Client runtime for one realtime session.
pub struct SessionClient {
    transport: Arc<dyn Transport>,
    registry: Arc<Registry>,
    handlers: Arc<HandlerTable>,
}

impl SessionClient {
    /// Create a client over the process-wide builtin registry.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_registry(transport, Registry::builtin())
    }

    /// Create a client over a caller-supplied registry.
    pub fn with_registry(transport: Arc<dyn Transport>, registry: Arc<Registry>) -> Self {
        Self {
            transport,
            registry,
            handlers: Arc::new(HandlerTable::new()),
        }
    }

    /// The handler table for typed-event subscriptions.
    pub fn handlers(&self) -> &Arc<HandlerTable> {
        &self.handlers
    }

    /// The decoder registry this client dispatches with.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Serialize and send one command, returning the generated client
    /// event ID.
    pub async fn send_command(&self, command: &ClientCommand) -> Result<String, ClientError> {
        let event_id = format!("evt_{}", Uuid::now_v7().simple());
        let wire = command.to_wire(&event_id)?;
        debug!(
            event_type = command.discriminator(),
            event_id = %event_id,
            "sending command"
        );
        self.transport.send(wire).await?;
        Ok(event_id)
    }

    /// Run the inbound reader loop until the transport's channel closes or
    /// the update consumer goes away.
    ///
    /// Per frame, in order: parse, decode, dispatch to typed subscribers,
    /// forward the normalized update. Transport-level malformed JSON is
    /// logged and skipped (it produces no update); a decode failure for a
    /// registered discriminator becomes an `Error`-kind update and the
    /// stream continues.
    pub async fn run_reader(
        &self,
        mut inbound: mpsc::Receiver<String>,
        updates: mpsc::Sender<SessionUpdate>,
    ) {
        while let Some(text) = inbound.recv().await {
            let frame = match RawFrame::parse(&text) {
                Ok(frame) => frame,
                Err(error) => {
                    warn!(error = %error, "dropping unparseable inbound frame");
                    continue;
                }
            };
            let update = self.process_frame(frame);
            if updates.send(update).await.is_err() {
                debug!("update consumer dropped; stopping reader");
                break;
            }
        }
    }

    /// Decode, dispatch, and normalize one frame.
    fn process_frame(&self, frame: RawFrame) -> SessionUpdate {
        match self.registry.try_decode(&frame) {
            Ok(Some(event)) => {
                let outcome = self.handlers.dispatch(event.discriminator(), &event);
                if !outcome.is_clean() {
                    // Each failure was already logged by the table; the
                    // reader only records the aggregate and moves on.
                    debug!(
                        event_type = event.discriminator(),
                        failures = outcome.failures.len(),
                        "dispatch completed with subscriber failures"
                    );
                }
                Normalizer::to_update(event)
            }
            Ok(None) => SessionUpdate::Unknown { raw: frame },
            Err(error) => {
                warn!(
                    event_type = frame.discriminator(),
                    error = %error,
                    "frame failed to decode; continuing"
                );
                SessionUpdate::local_error(error.to_string())
            }
        }
    }

    /// Establish the avatar media channel.
    ///
    /// Creates a one-attempt [`AvatarHandshake`], wires its answer slot to
    /// a temporary `session.avatar.connecting` subscriber, sends the offer
    /// through this client's command path, and runs the handshake to
    /// `Connected`. The subscriber is removed whatever the outcome, and a
    /// failure is returned to this caller only.
    pub async fn connect_avatar(
        &self,
        engine: Arc<dyn MediaEngine>,
        config: HandshakeConfig,
        cancel: CancellationToken,
    ) -> Result<Arc<AvatarHandshake>, ClientError> {
        let handshake = Arc::new(AvatarHandshake::new(engine, config));
        let slot = handshake.answer_slot();

        let subscription = self.handlers.subscribe(
            discriminators::AVATAR_CONNECTING,
            Arc::new(move |event: &ServerEvent| {
                if let ServerEvent::AvatarConnecting(e) = event {
                    if !slot.deliver(e.server_sdp.clone()) {
                        debug!("avatar answer arrived after the handshake stopped waiting");
                    }
                }
                Ok(())
            }),
        );

        let sink = CommandSink { client: self };
        let result = handshake.connect(&sink, cancel).await;
        self.handlers
            .unsubscribe(discriminators::AVATAR_CONNECTING, subscription);
        result?;
        Ok(handshake)
    }
}

/// Adapts the client's command path to the handshake's signaling seam.
struct CommandSink<'a> {
    client: &'a SessionClient,
}

#[async_trait]
impl SignalSink for CommandSink<'_> {
    async fn send_avatar_offer(&self, client_sdp: &str) -> Result<(), String> {
        self.client
            .send_command(&ClientCommand::AvatarConnect {
                client_sdp: client_sdp.to_owned(),
            })
            .await
            .map(|_event_id| ())
            .map_err(|e| e.to_string())
    }
}
