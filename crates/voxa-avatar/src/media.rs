//! The media engine contract.
//!
//! The WebRTC engine (ICE, DTLS, SRTP, RTP) is an external collaborator;
//! this module defines the narrow signaling surface the handshake consumes.
//! Engine-side callbacks are expressed as a broadcast event stream, which is
//! what makes the handshake's bounded waits plain `tokio::time::timeout`
//! calls instead of callback plumbing.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::broadcast;

/// One ICE server entry, supplied once per handshake and read-only after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceServerConfig {
    /// STUN/TURN URLs.
    pub urls: Vec<String>,
    /// TURN username, when required.
    pub username: Option<String>,
    /// TURN credential, when required.
    pub credential: Option<String>,
}

impl IceServerConfig {
    /// A credential-less STUN entry.
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// Negotiated codec parameters for the avatar's receive-only video track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCodecParams {
    /// Codec name.
    pub codec: String,
    /// RTP packetization mode.
    pub packetization_mode: u8,
    /// H.264 profile-level-id.
    pub profile_level_id: String,
}

impl Default for VideoCodecParams {
    fn default() -> Self {
        Self {
            codec: "H264".into(),
            packetization_mode: 1,
            profile_level_id: "42e01f".into(),
        }
    }
}

/// Media kind for diagnostic events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Audio track.
    Audio,
    /// Video track.
    Video,
}

/// Peer connection state as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Freshly created.
    New,
    /// ICE/DTLS handshake in progress.
    Connecting,
    /// Media path established.
    Connected,
    /// Media path lost.
    Disconnected,
    /// Negotiation or transport failed.
    Failed,
    /// Torn down.
    Closed,
}

/// One decoded video frame from the engine.
///
/// The only outward-facing data product of the handshake besides its state
/// transitions; re-published by the controller while connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Decoded pixel data.
    pub data: Bytes,
    /// Capture timestamp in microseconds.
    pub timestamp_us: u64,
}

/// Events emitted by the media engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// Local ICE candidate gathering finished; the local description is
    /// final and ready to send.
    IceGatheringComplete,
    /// The peer connection state changed.
    ConnectionState(ConnectionState),
    /// A decoded video frame arrived.
    VideoFrame(VideoFrame),
    /// An RTP packet arrived (diagnostic only).
    RtpPacket {
        /// Which track the packet belongs to.
        kind: MediaKind,
        /// Packet size in bytes.
        bytes: usize,
    },
    /// The negotiated format list for a track (diagnostic only).
    NegotiatedFormats {
        /// Which track the formats apply to.
        kind: MediaKind,
        /// Format descriptions.
        formats: Vec<String>,
    },
    /// No packets seen on a track for the engine's timeout window
    /// (diagnostic only).
    MediaTimeout {
        /// The starved track.
        kind: MediaKind,
    },
}

/// Failure reported by the media engine.
#[derive(Debug, Clone, Error)]
pub enum MediaEngineError {
    /// The engine rejected the supplied configuration.
    #[error("engine rejected configuration: {0}")]
    Rejected(String),
    /// The engine failed during an operation.
    #[error("engine failure: {0}")]
    Failed(String),
}

/// The narrow signaling contract the handshake drives.
///
/// Implementations wrap a real WebRTC stack; tests use in-memory stubs.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Apply ICE server configuration for this connection attempt.
    async fn configure(&self, ice_servers: &[IceServerConfig]) -> Result<(), MediaEngineError>;

    /// Add a receive-only video track with the given codec parameters.
    async fn add_receive_only_video_track(
        &self,
        params: &VideoCodecParams,
    ) -> Result<(), MediaEngineError>;

    /// Create the local SDP offer.
    async fn create_offer(&self) -> Result<String, MediaEngineError>;

    /// Install the local description.
    async fn set_local_description(&self, sdp: &str) -> Result<(), MediaEngineError>;

    /// The finalized local description, once ICE gathering has completed.
    fn local_description(&self) -> Option<String>;

    /// Begin ICE candidate gathering. Completion is signaled via
    /// [`MediaEvent::IceGatheringComplete`].
    fn start_ice_gathering(&self);

    /// Apply the remote answer description.
    async fn set_remote_description(&self, sdp: &str) -> Result<(), MediaEngineError>;

    /// Start the engine's playout/processing loop after the connection is
    /// established.
    async fn start_playout(&self) -> Result<(), MediaEngineError>;

    /// Tear the connection down.
    async fn close(&self);

    /// Subscribe to engine events.
    fn subscribe(&self) -> broadcast::Receiver<MediaEvent>;
}
