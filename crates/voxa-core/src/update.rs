//! The normalized session update handed to application code.
//!
//! One [`SessionUpdate`] is produced per inbound frame — a 1:1, order
//! preserving transform. Variants carry only the fields application logic
//! reads; the `Unknown` fallback retains the whole raw frame so nothing on
//! the wire is ever silently dropped.

use crate::events::{ErrorDetail, ResponseSummary, SessionSnapshot};
use crate::frame::RawFrame;

/// The normalized representation of one inbound frame.
///
/// Immutable after construction, owned by whoever receives it from the
/// dispatch call.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// The session is established.
    SessionCreated {
        /// The created session.
        session: SessionSnapshot,
    },

    /// The session configuration changed.
    SessionUpdated {
        /// The updated session.
        session: SessionSnapshot,
    },

    /// Server VAD detected the start of user speech.
    SpeechStarted {
        /// Offset into the input buffer, in milliseconds.
        audio_start_ms: u64,
    },

    /// Server VAD detected the end of user speech.
    SpeechStopped {
        /// Offset into the input buffer, in milliseconds.
        audio_end_ms: u64,
    },

    /// One chunk of synthesized output audio. Wire order must be preserved
    /// for correct playback.
    AudioDelta {
        /// Conversation item the audio belongs to.
        item_id: String,
        /// Base64-encoded audio bytes.
        delta: String,
    },

    /// One chunk of the output transcript. Wire order must be preserved for
    /// correct transcript assembly.
    AudioTranscriptDelta {
        /// Conversation item the transcript belongs to.
        item_id: String,
        /// Transcript text fragment.
        delta: String,
    },

    /// A response finished streaming.
    ResponseDone {
        /// Summary of the finished response.
        response: ResponseSummary,
    },

    /// An item was added to the conversation.
    ItemCreated {
        /// ID of the created item.
        item_id: String,
        /// Role for message items, when reported.
        role: Option<String>,
    },

    /// Input audio transcription completed for an item.
    TranscriptionCompleted {
        /// Conversation item the transcript belongs to.
        item_id: String,
        /// The full transcript text.
        transcript: String,
    },

    /// The server is answering an avatar offer.
    AvatarConnecting {
        /// Base64-encoded answer envelope, still undecoded.
        server_sdp: String,
    },

    /// A server-reported error, or a locally-detected decode failure for a
    /// registered discriminator (one bad frame never aborts the session).
    Error {
        /// The error detail.
        error: ErrorDetail,
    },

    /// A frame whose discriminator has no registered decoder. Expected and
    /// legal; the original frame is retained for diagnostics.
    Unknown {
        /// The undecoded frame.
        raw: RawFrame,
    },
}

impl SessionUpdate {
    /// Short kind label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "session_created",
            Self::SessionUpdated { .. } => "session_updated",
            Self::SpeechStarted { .. } => "speech_started",
            Self::SpeechStopped { .. } => "speech_stopped",
            Self::AudioDelta { .. } => "audio_delta",
            Self::AudioTranscriptDelta { .. } => "audio_transcript_delta",
            Self::ResponseDone { .. } => "response_done",
            Self::ItemCreated { .. } => "item_created",
            Self::TranscriptionCompleted { .. } => "transcription_completed",
            Self::AvatarConnecting { .. } => "avatar_connecting",
            Self::Error { .. } => "error",
            Self::Unknown { .. } => "unknown",
        }
    }

    /// Build an error-kind update from a local diagnostic message.
    pub fn local_error(message: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorDetail {
                kind: Some("client_decode_error".into()),
                code: None,
                message: message.into(),
                event_id: None,
            },
        }
    }
}
