//! Typed server events for the session protocol.
//!
//! One payload struct per registered discriminator, plus [`ServerEvent`], the
//! closed enum the decoder registry produces. These are the handful of wire
//! shapes the runtime actually interprets; every other discriminator on the
//! wire stays a [`crate::frame::RawFrame`] and reaches the application as
//! `SessionUpdate::Unknown`.
//!
//! Field sets are deliberately lean: only what the dispatch layer and
//! application logic read. Unknown fields in the wire JSON are ignored on
//! decode.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Payload structs
// ─────────────────────────────────────────────────────────────────────────────

/// Server-side view of the session, as carried by `session.created` and
/// `session.updated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Server-assigned session ID.
    pub id: String,
    /// Model backing the session, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Voice selected for audio output, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

/// `session.created` — the session is established.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCreated {
    /// Server event ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// The created session.
    pub session: SessionSnapshot,
}

/// `session.updated` — the session configuration changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdated {
    /// Server event ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// The updated session.
    pub session: SessionSnapshot,
}

/// `input_audio_buffer.speech_started` — server VAD detected speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechStarted {
    /// Server event ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Offset into the input buffer where speech began, in milliseconds.
    #[serde(default)]
    pub audio_start_ms: u64,
    /// Conversation item the speech will be attributed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
}

/// `input_audio_buffer.speech_stopped` — server VAD detected end of speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechStopped {
    /// Server event ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Offset into the input buffer where speech ended, in milliseconds.
    #[serde(default)]
    pub audio_end_ms: u64,
    /// Conversation item the speech was attributed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
}

/// `response.audio.delta` — one chunk of synthesized output audio.
///
/// `delta` is base64-encoded audio and can be large; avoid logging this
/// struct with `Debug` in production paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioDelta {
    /// Server event ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Response this delta belongs to.
    pub response_id: String,
    /// Conversation item this delta belongs to.
    pub item_id: String,
    /// Index of the output within the response.
    #[serde(default)]
    pub output_index: u32,
    /// Index of the content part within the item.
    #[serde(default)]
    pub content_index: u32,
    /// Base64-encoded audio bytes.
    pub delta: String,
}

/// `response.audio_transcript.delta` — one chunk of the output transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTranscriptDelta {
    /// Server event ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Response this delta belongs to.
    pub response_id: String,
    /// Conversation item this delta belongs to.
    pub item_id: String,
    /// Index of the output within the response.
    #[serde(default)]
    pub output_index: u32,
    /// Index of the content part within the item.
    #[serde(default)]
    pub content_index: u32,
    /// Transcript text fragment.
    pub delta: String,
}

/// Terminal summary of a response, as carried by `response.done`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSummary {
    /// Response ID.
    pub id: String,
    /// Terminal status (`completed`, `cancelled`, `failed`, `incomplete`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// `response.done` — a response finished streaming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseDone {
    /// Server event ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Summary of the finished response.
    pub response: ResponseSummary,
}

/// A conversation item, as carried by `conversation.item.created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    /// Item ID.
    pub id: String,
    /// Item kind (`message`, `function_call`, ...).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Role for message items (`user`, `assistant`, `system`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// `conversation.item.created` — an item was added to the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCreated {
    /// Server event ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Item this one was inserted after, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_item_id: Option<String>,
    /// The created item.
    pub item: ConversationItem,
}

/// `conversation.item.input_audio_transcription.completed` — input audio for
/// an item finished transcribing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionCompleted {
    /// Server event ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Conversation item the transcript belongs to.
    pub item_id: String,
    /// Index of the content part within the item.
    #[serde(default)]
    pub content_index: u32,
    /// The full transcript text.
    pub transcript: String,
}

/// Error detail carried by the `error` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Error category string.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Machine-readable error code, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Client event ID the error refers to, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

/// `error` — the server reported a protocol or processing error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Server event ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// The error detail.
    pub error: ErrorDetail,
}

/// `session.avatar.connecting` — the server answered an avatar offer.
///
/// `server_sdp` is a base64-encoded JSON envelope of shape `{"sdp":"..."}`;
/// decoding it is the avatar handshake's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarConnecting {
    /// Server event ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Base64-encoded answer envelope.
    pub server_sdp: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// ServerEvent — the decoded-event enum
// ─────────────────────────────────────────────────────────────────────────────

/// A strongly-typed inbound event, one variant per registered discriminator.
///
/// Produced by the decoder registry, handed to subscribers synchronously
/// within the dispatch call, then discarded — subscribers clone what they
/// need to keep.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// `session.created`
    SessionCreated(SessionCreated),
    /// `session.updated`
    SessionUpdated(SessionUpdated),
    /// `input_audio_buffer.speech_started`
    SpeechStarted(SpeechStarted),
    /// `input_audio_buffer.speech_stopped`
    SpeechStopped(SpeechStopped),
    /// `response.audio.delta`
    AudioDelta(AudioDelta),
    /// `response.audio_transcript.delta`
    AudioTranscriptDelta(AudioTranscriptDelta),
    /// `response.done`
    ResponseDone(ResponseDone),
    /// `conversation.item.created`
    ItemCreated(ItemCreated),
    /// `conversation.item.input_audio_transcription.completed`
    TranscriptionCompleted(TranscriptionCompleted),
    /// `error`
    Error(ErrorEvent),
    /// `session.avatar.connecting`
    AvatarConnecting(AvatarConnecting),
}

impl ServerEvent {
    /// The wire discriminator this event decoded from.
    pub fn discriminator(&self) -> &'static str {
        match self {
            Self::SessionCreated(_) => discriminators::SESSION_CREATED,
            Self::SessionUpdated(_) => discriminators::SESSION_UPDATED,
            Self::SpeechStarted(_) => discriminators::SPEECH_STARTED,
            Self::SpeechStopped(_) => discriminators::SPEECH_STOPPED,
            Self::AudioDelta(_) => discriminators::AUDIO_DELTA,
            Self::AudioTranscriptDelta(_) => discriminators::AUDIO_TRANSCRIPT_DELTA,
            Self::ResponseDone(_) => discriminators::RESPONSE_DONE,
            Self::ItemCreated(_) => discriminators::ITEM_CREATED,
            Self::TranscriptionCompleted(_) => discriminators::TRANSCRIPTION_COMPLETED,
            Self::Error(_) => discriminators::ERROR,
            Self::AvatarConnecting(_) => discriminators::AVATAR_CONNECTING,
        }
    }

    /// The server event ID, when the wire frame carried one.
    pub fn event_id(&self) -> Option<&str> {
        let id = match self {
            Self::SessionCreated(e) => &e.event_id,
            Self::SessionUpdated(e) => &e.event_id,
            Self::SpeechStarted(e) => &e.event_id,
            Self::SpeechStopped(e) => &e.event_id,
            Self::AudioDelta(e) => &e.event_id,
            Self::AudioTranscriptDelta(e) => &e.event_id,
            Self::ResponseDone(e) => &e.event_id,
            Self::ItemCreated(e) => &e.event_id,
            Self::TranscriptionCompleted(e) => &e.event_id,
            Self::Error(e) => &e.event_id,
            Self::AvatarConnecting(e) => &e.event_id,
        };
        id.as_deref()
    }
}

/// Wire discriminator strings for the events this runtime interprets.
pub mod discriminators {
    /// `session.created`
    pub const SESSION_CREATED: &str = "session.created";
    /// `session.updated`
    pub const SESSION_UPDATED: &str = "session.updated";
    /// `input_audio_buffer.speech_started`
    pub const SPEECH_STARTED: &str = "input_audio_buffer.speech_started";
    /// `input_audio_buffer.speech_stopped`
    pub const SPEECH_STOPPED: &str = "input_audio_buffer.speech_stopped";
    /// `response.audio.delta`
    pub const AUDIO_DELTA: &str = "response.audio.delta";
    /// `response.audio_transcript.delta`
    pub const AUDIO_TRANSCRIPT_DELTA: &str = "response.audio_transcript.delta";
    /// `response.done`
    pub const RESPONSE_DONE: &str = "response.done";
    /// `conversation.item.created`
    pub const ITEM_CREATED: &str = "conversation.item.created";
    /// `conversation.item.input_audio_transcription.completed`
    pub const TRANSCRIPTION_COMPLETED: &str =
        "conversation.item.input_audio_transcription.completed";
    /// `error`
    pub const ERROR: &str = "error";
    /// `session.avatar.connecting`
    pub const AVATAR_CONNECTING: &str = "session.avatar.connecting";
}

/// Deserialize a payload struct from a raw frame value, ignoring the
/// envelope fields serde does not know about.
pub fn decode_payload<T: serde::de::DeserializeOwned>(
    value: &Value,
) -> Result<T, serde_json::Error> {
    T::deserialize(value)
}
