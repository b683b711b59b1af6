//! RawFrame → `SessionUpdate` normalization.
//!
//! Exactly one update per frame, in wire order, with no buffering or
//! coalescing — audio and transcript deltas must reach the application in
//! the order the transport delivered them.
//!
//! The normalizer owns no mutable state of its own; it borrows the
//! registry's decode step and is safe to share across inbound streams under
//! the registry's own concurrency contract.

use std::sync::Arc;

use tracing::warn;

use voxa_core::events::ServerEvent;
use voxa_core::frame::RawFrame;
use voxa_core::update::SessionUpdate;

use crate::registry::Registry;

/// Wraps registry decode results into the closed [`SessionUpdate`] set.
#[derive(Debug, Clone)]
pub struct Normalizer {
    registry: Arc<Registry>,
}

impl Normalizer {
    /// Create a normalizer over the given registry.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Create a normalizer over the process-wide builtin registry.
    pub fn builtin() -> Self {
        Self::new(Registry::builtin())
    }

    /// The registry this normalizer decodes with.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Normalize one inbound frame.
    ///
    /// Never fails: an unregistered discriminator degrades to `Unknown`
    /// (retaining the raw frame), and a decode failure for a registered
    /// discriminator becomes an `Error`-kind update — one bad frame must not
    /// abort the session.
    pub fn normalize(&self, frame: &RawFrame) -> SessionUpdate {
        match self.registry.try_decode(frame) {
            Ok(Some(event)) => Self::to_update(event),
            Ok(None) => SessionUpdate::Unknown { raw: frame.clone() },
            Err(error) => {
                warn!(
                    event_type = frame.discriminator(),
                    event_id = frame.event_id().unwrap_or(""),
                    error = %error,
                    "frame failed to decode; continuing"
                );
                SessionUpdate::local_error(error.to_string())
            }
        }
    }

    /// Decode an already-typed event into its update variant.
    ///
    /// Used on the dispatch path where the registry decode already ran.
    pub fn to_update(event: ServerEvent) -> SessionUpdate {
        match event {
            ServerEvent::SessionCreated(e) => SessionUpdate::SessionCreated { session: e.session },
            ServerEvent::SessionUpdated(e) => SessionUpdate::SessionUpdated { session: e.session },
            ServerEvent::SpeechStarted(e) => SessionUpdate::SpeechStarted {
                audio_start_ms: e.audio_start_ms,
            },
            ServerEvent::SpeechStopped(e) => SessionUpdate::SpeechStopped {
                audio_end_ms: e.audio_end_ms,
            },
            ServerEvent::AudioDelta(e) => SessionUpdate::AudioDelta {
                item_id: e.item_id,
                delta: e.delta,
            },
            ServerEvent::AudioTranscriptDelta(e) => SessionUpdate::AudioTranscriptDelta {
                item_id: e.item_id,
                delta: e.delta,
            },
            ServerEvent::ResponseDone(e) => SessionUpdate::ResponseDone {
                response: e.response,
            },
            ServerEvent::ItemCreated(e) => SessionUpdate::ItemCreated {
                item_id: e.item.id,
                role: e.item.role,
            },
            ServerEvent::TranscriptionCompleted(e) => SessionUpdate::TranscriptionCompleted {
                item_id: e.item_id,
                transcript: e.transcript,
            },
            ServerEvent::AvatarConnecting(e) => SessionUpdate::AvatarConnecting {
                server_sdp: e.server_sdp,
            },
            ServerEvent::Error(e) => SessionUpdate::Error { error: e.error },
        }
    }
}
