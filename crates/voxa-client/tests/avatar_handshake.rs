//! End-to-end avatar handshake over a loopback transport.
//!
//! The "server" here is a task that watches the client's outbound frames,
//! and answers a `session.avatar.connect` command with a synthetic
//! `session.avatar.connecting` frame carrying a fixed base64 SDP answer —
//! the whole exchange runs through the real reader loop, registry, handler
//! table, and handshake state machine.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use voxa_avatar::media::{ConnectionState, MediaEngineError};
use voxa_avatar::sdp::escape_sdp;
use voxa_avatar::{
    HandshakeConfig, HandshakeError, HandshakeState, IceServerConfig, MediaEngine, MediaEvent,
    VideoCodecParams,
};
use voxa_client::{SessionClient, Transport, TransportError};
use voxa_core::update::SessionUpdate;

const OFFER_SDP: &str = "v=0\r\nm=video 9 UDP/TLS/RTP/SAVP 96\r\na=rtpmap:96 H264/90000\r\n";
const ANSWER_SDP: &str = "v=0\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\na=recvonly\r\n";

/// Transport whose outbound frames land on a channel the test can watch.
struct LoopbackTransport {
    outbound: mpsc::Sender<String>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, text: String) -> Result<(), TransportError> {
        self.outbound
            .send(text)
            .await
            .map_err(|_| TransportError::Closed)
    }
}

/// Engine that gathers immediately and reports connected once the answer
/// is applied.
struct InstantEngine {
    events: broadcast::Sender<MediaEvent>,
    gathering_completes: bool,
    remote: Mutex<Option<String>>,
}

impl InstantEngine {
    fn new(gathering_completes: bool) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            events,
            gathering_completes,
            remote: Mutex::new(None),
        })
    }
}

#[async_trait]
impl MediaEngine for InstantEngine {
    async fn configure(&self, _ice: &[IceServerConfig]) -> Result<(), MediaEngineError> {
        Ok(())
    }

    async fn add_receive_only_video_track(
        &self,
        _params: &VideoCodecParams,
    ) -> Result<(), MediaEngineError> {
        Ok(())
    }

    async fn create_offer(&self) -> Result<String, MediaEngineError> {
        Ok(OFFER_SDP.to_owned())
    }

    async fn set_local_description(&self, _sdp: &str) -> Result<(), MediaEngineError> {
        Ok(())
    }

    fn local_description(&self) -> Option<String> {
        Some(OFFER_SDP.to_owned())
    }

    fn start_ice_gathering(&self) {
        if self.gathering_completes {
            let _ = self.events.send(MediaEvent::IceGatheringComplete);
        }
    }

    async fn set_remote_description(&self, sdp: &str) -> Result<(), MediaEngineError> {
        *self.remote.lock() = Some(sdp.to_owned());
        let _ = self
            .events
            .send(MediaEvent::ConnectionState(ConnectionState::Connected));
        Ok(())
    }

    async fn start_playout(&self) -> Result<(), MediaEngineError> {
        Ok(())
    }

    async fn close(&self) {}

    fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.events.subscribe()
    }
}

fn answer_frame() -> String {
    let envelope = format!(
        r#"{{"sdp":"{}"}}"#,
        escape_sdp(ANSWER_SDP).replace('\\', "\\\\")
    );
    json!({
        "type": "session.avatar.connecting",
        "event_id": "ev_srv_1",
        "server_sdp": BASE64.encode(envelope)
    })
    .to_string()
}

fn loopback_client() -> (Arc<SessionClient>, mpsc::Receiver<String>) {
    let (out_tx, out_rx) = mpsc::channel(8);
    let transport = Arc::new(LoopbackTransport { outbound: out_tx });
    (Arc::new(SessionClient::new(transport)), out_rx)
}

#[tokio::test]
async fn handshake_reaches_connected_through_the_real_dispatch_path() {
    let (client, mut out_rx) = loopback_client();
    let (in_tx, in_rx) = mpsc::channel::<String>(8);
    let (update_tx, mut update_rx) = mpsc::channel::<SessionUpdate>(8);

    let reader_client = Arc::clone(&client);
    let _reader = tokio::spawn(async move {
        reader_client.run_reader(in_rx, update_tx).await;
    });

    // Echo server: answer the avatar offer with the fixed base64 answer.
    let echo = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            let value: Value = serde_json::from_str(&text).expect("client sends valid JSON");
            if value["type"] == "session.avatar.connect" && in_tx.send(answer_frame()).await.is_err()
            {
                break;
            }
        }
    });

    let engine = InstantEngine::new(true);
    let handshake = client
        .connect_avatar(
            Arc::clone(&engine) as Arc<dyn MediaEngine>,
            HandshakeConfig::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(handshake.state(), HandshakeState::Connected);
    // The engine received the decoded, unescaped answer text exactly.
    assert_eq!(engine.remote.lock().as_deref(), Some(ANSWER_SDP));

    // The answer frame also reached the ordinary update stream.
    let update = update_rx.recv().await.unwrap();
    assert_eq!(update.kind(), "avatar_connecting");

    echo.abort();
}

#[tokio::test(start_paused = true)]
async fn handshake_times_out_when_gathering_never_completes() {
    let (client, _out_rx) = loopback_client();
    let engine = InstantEngine::new(false);

    let err = client
        .connect_avatar(
            engine as Arc<dyn MediaEngine>,
            HandshakeConfig::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        voxa_client::ClientError::Handshake(HandshakeError::IceGatheringTimeout(_)) => {}
        other => panic!("expected gathering timeout, got {other}"),
    }
    // The temporary answer subscriber was removed on failure.
    assert_eq!(
        client.handlers().subscriber_count("session.avatar.connecting"),
        0
    );
}

#[tokio::test]
async fn cancellation_fails_the_attempt_and_cleans_up() {
    let (client, mut out_rx) = loopback_client();
    // Swallow the offer so no answer ever arrives.
    let swallow = tokio::spawn(async move { while out_rx.recv().await.is_some() {} });

    let engine = InstantEngine::new(true);
    let cancel = CancellationToken::new();
    let attempt = {
        let client = Arc::clone(&client);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            client
                .connect_avatar(engine as Arc<dyn MediaEngine>, HandshakeConfig::default(), cancel)
                .await
        })
    };

    tokio::task::yield_now().await;
    cancel.cancel();

    let err = attempt.await.unwrap().unwrap_err();
    match err {
        voxa_client::ClientError::Handshake(HandshakeError::Cancelled) => {}
        other => panic!("expected cancellation, got {other}"),
    }
    assert_eq!(
        client.handlers().subscriber_count("session.avatar.connecting"),
        0
    );
    swallow.abort();
}
