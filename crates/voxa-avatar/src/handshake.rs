//! The avatar handshake state machine.
//!
//! One [`AvatarHandshake`] instance drives exactly one connection attempt:
//!
//! ```text
//! Idle → OfferCreated → IceGathering → OfferSent → AwaitingAnswer
//!      → Connected → Closed
//! ```
//!
//! Any step may transition to the terminal `Failed` with a captured cause;
//! there is no implicit retry. The two true suspension points — waiting for
//! ICE gathering to complete and waiting for the remote answer — are both
//! bounded by configurable timeouts and cancellable via a
//! [`CancellationToken`], so a stalled network can never leave the machine
//! stuck.
//!
//! The answer arrives later as an ordinary inbound frame
//! (`session.avatar.connecting`); the client wires that subscriber to the
//! [`AnswerSlot`] this controller hands out.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::media::{
    ConnectionState, IceServerConfig, MediaEngine, MediaEngineError, MediaEvent, VideoCodecParams,
    VideoFrame,
};
use crate::sdp::{self, EnvelopeError, ProfileRewrite};

/// Default bound on the ICE gathering wait.
const DEFAULT_ICE_GATHERING_TIMEOUT: Duration = Duration::from_secs(10);
/// Default bound on the answer wait.
const DEFAULT_ANSWER_TIMEOUT: Duration = Duration::from_secs(15);
/// Default bound on the engine reporting `Connected` after the answer is
/// applied.
const DEFAULT_CONNECTED_TIMEOUT: Duration = Duration::from_secs(15);
/// Capacity of the re-published video frame channel.
const VIDEO_CHANNEL_CAPACITY: usize = 32;

/// Configuration for one handshake attempt, read-only after construction.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// ICE servers handed to the engine.
    pub ice_servers: Vec<IceServerConfig>,
    /// Codec parameters for the receive-only video track.
    pub video_codec: VideoCodecParams,
    /// Bound on the ICE gathering wait.
    pub ice_gathering_timeout: Duration,
    /// Bound on the answer wait.
    pub answer_timeout: Duration,
    /// Bound on the engine reporting `Connected`.
    pub connected_timeout: Duration,
    /// Transport profile rewrite applied to the local SDP before sending;
    /// `None` disables it.
    pub profile_rewrite: Option<ProfileRewrite>,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            ice_servers: Vec::new(),
            video_codec: VideoCodecParams::default(),
            ice_gathering_timeout: DEFAULT_ICE_GATHERING_TIMEOUT,
            answer_timeout: DEFAULT_ANSWER_TIMEOUT,
            connected_timeout: DEFAULT_CONNECTED_TIMEOUT,
            profile_rewrite: Some(ProfileRewrite::default()),
        }
    }
}

/// Handshake lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Not started.
    Idle,
    /// Local offer created and installed.
    OfferCreated,
    /// Waiting for ICE candidate gathering to complete.
    IceGathering,
    /// Offer sent over the session protocol.
    OfferSent,
    /// Waiting for the remote answer frame.
    AwaitingAnswer,
    /// Media path established, playout running.
    Connected,
    /// Normal teardown.
    Closed,
    /// Terminal failure; no implicit retry.
    Failed,
}

/// Failure of one handshake attempt.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The engine rejected configuration or track setup.
    #[error("handshake construction failed: {0}")]
    Construction(#[source] MediaEngineError),

    /// The engine failed mid-handshake.
    #[error("media engine failed: {0}")]
    Engine(#[source] MediaEngineError),

    /// ICE gathering did not complete within the configured bound.
    #[error("ICE gathering timed out after {0:?}")]
    IceGatheringTimeout(Duration),

    /// The answer frame never arrived within the configured bound.
    #[error("no answer within {0:?}")]
    AnswerTimeout(Duration),

    /// The engine never reported `Connected` within the configured bound.
    #[error("connection not established within {0:?}")]
    ConnectTimeout(Duration),

    /// The caller cancelled the attempt.
    #[error("handshake cancelled")]
    Cancelled,

    /// The answer envelope could not be decoded.
    #[error("answer envelope: {0}")]
    Envelope(#[from] EnvelopeError),

    /// Sending the offer over the session protocol failed.
    #[error("offer send failed: {0}")]
    Signal(String),

    /// The engine dropped its event stream mid-handshake.
    #[error("media engine event stream closed")]
    EngineGone,

    /// This controller already ran an attempt; create a new one.
    #[error("handshake instance already used")]
    AlreadyUsed,
}

/// Outbound signaling surface the handshake sends its offer through.
///
/// Implemented by the session client; tests use recording stubs.
#[async_trait]
pub trait SignalSink: Send + Sync {
    /// Send the base64 offer envelope as a `session.avatar.connect` command.
    async fn send_avatar_offer(&self, client_sdp: &str) -> Result<(), String>;
}

/// Write-once slot through which the answer frame reaches the handshake.
///
/// Cloneable so it can live inside a handler-table subscriber; only the
/// first delivery counts.
#[derive(Clone)]
pub struct AnswerSlot {
    tx: Arc<Mutex<Option<oneshot::Sender<String>>>>,
}

impl AnswerSlot {
    /// Deliver the base64 answer envelope. Returns `false` when an answer
    /// was already delivered (or the handshake is gone).
    pub fn deliver(&self, server_sdp: String) -> bool {
        match self.tx.lock().take() {
            Some(tx) => tx.send(server_sdp).is_ok(),
            None => false,
        }
    }
}

/// Drives one avatar connection attempt against an injected media engine.
///
/// Owned by exactly one in-flight attempt; a second `connect` call returns
/// [`HandshakeError::AlreadyUsed`] rather than interleaving two handshakes
/// on one instance.
pub struct AvatarHandshake {
    engine: Arc<dyn MediaEngine>,
    config: HandshakeConfig,
    started: AtomicBool,
    state: Arc<Mutex<HandshakeState>>,
    answer_tx: Arc<Mutex<Option<oneshot::Sender<String>>>>,
    answer_rx: Mutex<Option<oneshot::Receiver<String>>>,
    video_tx: broadcast::Sender<VideoFrame>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for AvatarHandshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvatarHandshake")
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl AvatarHandshake {
    /// Create a controller for one attempt against the given engine.
    pub fn new(engine: Arc<dyn MediaEngine>, config: HandshakeConfig) -> Self {
        let (answer_tx, answer_rx) = oneshot::channel();
        let (video_tx, _) = broadcast::channel(VIDEO_CHANNEL_CAPACITY);
        Self {
            engine,
            config,
            started: AtomicBool::new(false),
            state: Arc::new(Mutex::new(HandshakeState::Idle)),
            answer_tx: Arc::new(Mutex::new(Some(answer_tx))),
            answer_rx: Mutex::new(Some(answer_rx)),
            video_tx,
            pump: Mutex::new(None),
        }
    }

    /// Current state of the attempt.
    pub fn state(&self) -> HandshakeState {
        *self.state.lock()
    }

    /// The slot the `session.avatar.connecting` subscriber delivers into.
    pub fn answer_slot(&self) -> AnswerSlot {
        AnswerSlot {
            tx: Arc::clone(&self.answer_tx),
        }
    }

    /// Subscribe to decoded video frames, available once connected.
    pub fn video_frames(&self) -> broadcast::Receiver<VideoFrame> {
        self.video_tx.subscribe()
    }

    fn set_state(&self, next: HandshakeState) {
        debug!(state = ?next, "handshake state");
        *self.state.lock() = next;
    }

    fn fail(&self, error: HandshakeError) -> HandshakeError {
        warn!(error = %error, "handshake failed");
        self.set_state(HandshakeState::Failed);
        error
    }

    /// Run the handshake to the `Connected` state.
    ///
    /// Resolves the whole negotiation: offer construction, bounded ICE
    /// gathering, offer transmission, bounded answer wait, answer
    /// application, and the wait for the engine's `Connected` report.
    /// Failures are returned to this caller only; they are never broadcast
    /// to unrelated subscribers.
    pub async fn connect(
        &self,
        sink: &dyn SignalSink,
        cancel: CancellationToken,
    ) -> Result<(), HandshakeError> {
        // Claim the single attempt atomically, before any engine call, so
        // two concurrent callers cannot both pass the gate and interleave.
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(HandshakeError::AlreadyUsed);
        }

        // Subscribe before kicking anything off so no engine event is lost.
        let mut events = self.engine.subscribe();

        // Idle → OfferCreated. Engine rejection here is a construction
        // failure, fatal to this attempt only.
        if let Err(e) = self.engine.configure(&self.config.ice_servers).await {
            return Err(self.fail(HandshakeError::Construction(e)));
        }
        if let Err(e) = self
            .engine
            .add_receive_only_video_track(&self.config.video_codec)
            .await
        {
            return Err(self.fail(HandshakeError::Construction(e)));
        }
        let offer = match self.engine.create_offer().await {
            Ok(sdp) => sdp,
            Err(e) => return Err(self.fail(HandshakeError::Construction(e))),
        };
        if let Err(e) = self.engine.set_local_description(&offer).await {
            return Err(self.fail(HandshakeError::Construction(e)));
        }
        self.set_state(HandshakeState::OfferCreated);

        // OfferCreated → IceGathering: suspend until the engine signals
        // gathering-complete, bounded and cancellable.
        self.set_state(HandshakeState::IceGathering);
        self.engine.start_ice_gathering();
        self.wait_for_event(
            &mut events,
            &cancel,
            self.config.ice_gathering_timeout,
            |ev| matches!(ev, MediaEvent::IceGatheringComplete),
            HandshakeError::IceGatheringTimeout(self.config.ice_gathering_timeout),
        )
        .await?;

        // IceGathering → OfferSent: finalized SDP, profile rewrite,
        // envelope encoding, transmission.
        let local = match self.engine.local_description() {
            Some(sdp) => sdp,
            None => {
                return Err(self.fail(HandshakeError::Engine(MediaEngineError::Failed(
                    "no local description after ICE gathering".into(),
                ))));
            }
        };
        let local = match &self.config.profile_rewrite {
            Some(rewrite) => rewrite.apply(&local),
            None => local,
        };
        let client_sdp = match sdp::encode_offer(&local) {
            Ok(encoded) => encoded,
            Err(e) => return Err(self.fail(HandshakeError::Envelope(e))),
        };
        if let Err(e) = sink.send_avatar_offer(&client_sdp).await {
            return Err(self.fail(HandshakeError::Signal(e)));
        }
        self.set_state(HandshakeState::OfferSent);

        // OfferSent → AwaitingAnswer: the answer arrives as an ordinary
        // inbound frame, delivered through the answer slot.
        self.set_state(HandshakeState::AwaitingAnswer);
        let answer_rx = self
            .answer_rx
            .lock()
            .take()
            .ok_or(HandshakeError::AlreadyUsed)?;
        let encoded_answer = tokio::select! {
            () = cancel.cancelled() => return Err(self.fail(HandshakeError::Cancelled)),
            received = timeout(self.config.answer_timeout, answer_rx) => match received {
                Ok(Ok(encoded)) => encoded,
                Ok(Err(_)) => {
                    return Err(self.fail(HandshakeError::Signal("answer slot dropped".into())));
                }
                Err(_) => {
                    return Err(
                        self.fail(HandshakeError::AnswerTimeout(self.config.answer_timeout))
                    );
                }
            },
        };

        // AwaitingAnswer → Connected: decode, apply, wait for the engine's
        // connected report, start playout.
        let answer = match sdp::decode_answer(&encoded_answer) {
            Ok(sdp) => sdp,
            Err(e) => return Err(self.fail(HandshakeError::Envelope(e))),
        };
        if let Err(e) = self.engine.set_remote_description(&answer).await {
            return Err(self.fail(HandshakeError::Engine(e)));
        }
        self.wait_for_event(
            &mut events,
            &cancel,
            self.config.connected_timeout,
            |ev| matches!(ev, MediaEvent::ConnectionState(ConnectionState::Connected)),
            HandshakeError::ConnectTimeout(self.config.connected_timeout),
        )
        .await?;
        if let Err(e) = self.engine.start_playout().await {
            return Err(self.fail(HandshakeError::Engine(e)));
        }
        self.set_state(HandshakeState::Connected);
        info!("avatar media path established");

        self.spawn_event_pump(events);
        Ok(())
    }

    /// Normal teardown: close the engine, stop the event pump, and mark
    /// the attempt `Closed`.
    pub async fn close(&self) {
        self.engine.close().await;
        let pump = self.pump.lock().take();
        if let Some(pump) = pump {
            pump.abort();
            let _ = pump.await;
        }
        self.set_state(HandshakeState::Closed);
    }

    /// Wait on the engine event stream for an event matching `want`,
    /// bounded by `bound` and cancellable.
    async fn wait_for_event(
        &self,
        events: &mut broadcast::Receiver<MediaEvent>,
        cancel: &CancellationToken,
        bound: Duration,
        want: impl Fn(&MediaEvent) -> bool,
        on_timeout: HandshakeError,
    ) -> Result<(), HandshakeError> {
        let wait = async {
            loop {
                match events.recv().await {
                    Ok(ev) if want(&ev) => return Ok(()),
                    Ok(MediaEvent::ConnectionState(ConnectionState::Failed)) => {
                        return Err(HandshakeError::Engine(MediaEngineError::Failed(
                            "connection failed during negotiation".into(),
                        )));
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "lagged on media engine events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(HandshakeError::EngineGone);
                    }
                }
            }
        };
        tokio::select! {
            () = cancel.cancelled() => Err(self.fail(HandshakeError::Cancelled)),
            bounded = timeout(bound, wait) => match bounded {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(self.fail(e)),
                Err(_) => Err(self.fail(on_timeout)),
            },
        }
    }

    /// While connected, re-publish decoded video frames and log the
    /// diagnostic callbacks; flip to `Closed` on engine disconnect.
    fn spawn_event_pump(&self, mut events: broadcast::Receiver<MediaEvent>) {
        let video_tx = self.video_tx.clone();
        let state = Arc::clone(&self.state);
        let pump = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(MediaEvent::VideoFrame(frame)) => {
                        // Receiver-less send just means nobody is watching.
                        let _ = video_tx.send(frame);
                    }
                    Ok(MediaEvent::RtpPacket { kind, bytes }) => {
                        debug!(?kind, bytes, "rtp packet");
                    }
                    Ok(MediaEvent::NegotiatedFormats { kind, formats }) => {
                        debug!(?kind, formats = formats.len(), "negotiated formats");
                    }
                    Ok(MediaEvent::MediaTimeout { kind }) => {
                        warn!(?kind, "no media packets within engine timeout window");
                    }
                    Ok(MediaEvent::ConnectionState(
                        ConnectionState::Disconnected | ConnectionState::Closed,
                    )) => {
                        info!("media engine disconnected");
                        *state.lock() = HandshakeState::Closed;
                        break;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "lagged on media engine events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        *self.pump.lock() = Some(pump);
    }
}
