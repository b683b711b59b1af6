//! Discriminator → decoder registry.
//!
//! A decoder is a pure function from a raw frame to a [`ServerEvent`]; it
//! performs no I/O. The table is read-mostly after startup, so it sits behind
//! a `parking_lot::RwLock` and dispatch paths only ever take the read side.
//!
//! The builtin table covers every discriminator the normalizer interprets
//! and is populated lazily, exactly once, behind a `OnceLock` — concurrent
//! first use observes the fully-populated table or blocks until it exists.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;

use voxa_core::errors::DecodeError;
use voxa_core::events::{self, ServerEvent, discriminators as disc};
use voxa_core::frame::RawFrame;

/// A registered decode function.
pub type Decoder = Arc<dyn Fn(&RawFrame) -> Result<ServerEvent, DecodeError> + Send + Sync>;

/// Maps wire discriminators to decode functions.
pub struct Registry {
    decoders: RwLock<HashMap<String, Decoder>>,
}

static BUILTIN: OnceLock<Arc<Registry>> = OnceLock::new();

impl Registry {
    /// Create an empty registry with no decoders.
    pub fn empty() -> Self {
        Self {
            decoders: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry pre-populated with the builtin decoders.
    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        registry.install_builtins();
        registry
    }

    /// The process-wide builtin registry.
    ///
    /// Populated on first use, exactly once; every caller observes the full
    /// builtin set. There is no teardown — the table lives for the process.
    pub fn builtin() -> Arc<Self> {
        Arc::clone(BUILTIN.get_or_init(|| Arc::new(Self::with_builtins())))
    }

    /// Insert or overwrite the decoder for a discriminator.
    ///
    /// Registration is expected to happen at startup, before dispatch
    /// begins. Concurrent registration for the same key is safe but does not
    /// guarantee which writer wins.
    pub fn register(&self, discriminator: impl Into<String>, decoder: Decoder) {
        let _ = self.decoders.write().insert(discriminator.into(), decoder);
    }

    /// Register a serde-backed decoder for a payload type.
    fn register_typed<T>(&self, discriminator: &'static str, wrap: fn(T) -> ServerEvent)
    where
        T: DeserializeOwned + 'static,
    {
        let decoder: Decoder = Arc::new(move |frame: &RawFrame| {
            events::decode_payload::<T>(frame.value())
                .map(wrap)
                .map_err(|source| DecodeError::Shape {
                    discriminator: discriminator.to_owned(),
                    source,
                })
        });
        self.register(discriminator, decoder);
    }

    /// Decode a raw frame.
    ///
    /// `Ok(None)` means the discriminator has no registered decoder — an
    /// expected outcome the normalizer degrades to `Unknown`, not an error.
    /// `Err` means the discriminator is registered but the payload shape
    /// does not match.
    pub fn try_decode(&self, frame: &RawFrame) -> Result<Option<ServerEvent>, DecodeError> {
        let decoder = {
            let table = self.decoders.read();
            table.get(frame.discriminator()).cloned()
        };
        match decoder {
            Some(decode) => decode(frame).map(Some),
            None => Ok(None),
        }
    }

    /// Whether a decoder is registered for the discriminator.
    pub fn is_registered(&self, discriminator: &str) -> bool {
        self.decoders.read().contains_key(discriminator)
    }

    /// Number of registered decoders.
    pub fn len(&self) -> usize {
        self.decoders.read().len()
    }

    /// Whether the registry has no decoders.
    pub fn is_empty(&self) -> bool {
        self.decoders.read().is_empty()
    }

    fn install_builtins(&self) {
        use voxa_core::events::{
            AudioDelta, AudioTranscriptDelta, AvatarConnecting, ErrorEvent, ItemCreated,
            ResponseDone, SessionCreated, SessionUpdated, SpeechStarted, SpeechStopped,
            TranscriptionCompleted,
        };

        self.register_typed::<SessionCreated>(disc::SESSION_CREATED, ServerEvent::SessionCreated);
        self.register_typed::<SessionUpdated>(disc::SESSION_UPDATED, ServerEvent::SessionUpdated);
        self.register_typed::<SpeechStarted>(disc::SPEECH_STARTED, ServerEvent::SpeechStarted);
        self.register_typed::<SpeechStopped>(disc::SPEECH_STOPPED, ServerEvent::SpeechStopped);
        self.register_typed::<AudioDelta>(disc::AUDIO_DELTA, ServerEvent::AudioDelta);
        self.register_typed::<AudioTranscriptDelta>(
            disc::AUDIO_TRANSCRIPT_DELTA,
            ServerEvent::AudioTranscriptDelta,
        );
        self.register_typed::<ResponseDone>(disc::RESPONSE_DONE, ServerEvent::ResponseDone);
        self.register_typed::<ItemCreated>(disc::ITEM_CREATED, ServerEvent::ItemCreated);
        self.register_typed::<TranscriptionCompleted>(
            disc::TRANSCRIPTION_COMPLETED,
            ServerEvent::TranscriptionCompleted,
        );
        self.register_typed::<ErrorEvent>(disc::ERROR, ServerEvent::Error);
        self.register_typed::<AvatarConnecting>(
            disc::AVATAR_CONNECTING,
            ServerEvent::AvatarConnecting,
        );
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("decoders", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    const BUILTIN_COUNT: usize = 11;

    #[test]
    fn builtins_cover_required_discriminators() {
        let registry = Registry::with_builtins();
        for d in [
            "session.created",
            "session.updated",
            "input_audio_buffer.speech_started",
            "input_audio_buffer.speech_stopped",
            "response.audio.delta",
            "response.audio_transcript.delta",
            "response.done",
            "error",
            "conversation.item.input_audio_transcription.completed",
            "session.avatar.connecting",
            "conversation.item.created",
        ] {
            assert!(registry.is_registered(d), "missing builtin for {d}");
        }
        assert_eq!(registry.len(), BUILTIN_COUNT);
    }

    #[test]
    fn try_decode_returns_typed_event() {
        let registry = Registry::with_builtins();
        let frame = RawFrame::new(json!({
            "type": "input_audio_buffer.speech_started",
            "audio_start_ms": 250,
            "item_id": "item_1"
        }))
        .unwrap();

        let event = registry.try_decode(&frame).unwrap().unwrap();
        assert_matches!(event, ServerEvent::SpeechStarted(e) if e.audio_start_ms == 250);
    }

    #[test]
    fn unregistered_discriminator_is_not_found_not_error() {
        let registry = Registry::with_builtins();
        let frame = RawFrame::new(json!({"type": "rate_limits.updated"})).unwrap();
        assert!(registry.try_decode(&frame).unwrap().is_none());
    }

    #[test]
    fn shape_mismatch_is_a_decode_error() {
        let registry = Registry::with_builtins();
        // Registered discriminator, but `delta` has the wrong type.
        let frame = RawFrame::new(json!({
            "type": "response.audio.delta",
            "response_id": "r",
            "item_id": "i",
            "delta": 42
        }))
        .unwrap();

        let err = registry.try_decode(&frame).unwrap_err();
        assert_matches!(err, DecodeError::Shape { discriminator, .. } => {
            assert_eq!(discriminator, "response.audio.delta");
        });
    }

    #[test]
    fn register_overwrites_existing_decoder() {
        let registry = Registry::with_builtins();
        let stub: Decoder = Arc::new(|_frame| {
            Ok(ServerEvent::SpeechStarted(
                voxa_core::events::SpeechStarted {
                    event_id: None,
                    audio_start_ms: 999,
                    item_id: None,
                },
            ))
        });
        registry.register("session.created", stub);

        let frame = RawFrame::new(json!({"type": "session.created"})).unwrap();
        let event = registry.try_decode(&frame).unwrap().unwrap();
        assert_matches!(event, ServerEvent::SpeechStarted(_));
        assert_eq!(registry.len(), BUILTIN_COUNT);
    }

    #[test]
    fn builtin_initialization_is_idempotent_under_concurrency() {
        let handles: Vec<_> = (0..16)
            .map(|_| std::thread::spawn(|| Registry::builtin().len()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), BUILTIN_COUNT);
        }
        // All callers share the same instance.
        assert!(Arc::ptr_eq(&Registry::builtin(), &Registry::builtin()));
    }
}
