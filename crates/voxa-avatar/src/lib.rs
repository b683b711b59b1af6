//! # voxa-avatar
//!
//! The avatar media handshake: a one-shot offer/answer negotiation that
//! rides on the session protocol to establish a WebRTC media path for
//! avatar video.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `media` | `MediaEngine` trait and its event stream (external collaborator contract) |
//! | `sdp` | CRLF escaping, DTLS profile rewrite, base64 offer/answer envelopes |
//! | `handshake` | `AvatarHandshake` state machine with bounded, cancellable waits |
//!
//! The ICE/DTLS/SRTP machinery itself is opaque to this crate; it is
//! consumed only through the narrow [`media::MediaEngine`] signaling
//! contract.

#![deny(unsafe_code)]

pub mod handshake;
pub mod media;
pub mod sdp;

pub use handshake::{
    AnswerSlot, AvatarHandshake, HandshakeConfig, HandshakeError, HandshakeState, SignalSink,
};
pub use media::{IceServerConfig, MediaEngine, MediaEvent, VideoCodecParams, VideoFrame};
