//! Outbound client commands.
//!
//! The runtime sends a handful of commands over the session protocol; each
//! serializes to a JSON object tagged by `type`, with a client-generated
//! `event_id` attached at send time by `voxa-client`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A client-to-server command on the session protocol.
///
/// Discriminated by the `type` field in the wire JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    /// Update the session configuration.
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Partial session configuration, passed through opaquely.
        session: Value,
    },

    /// Append audio bytes to the input audio buffer.
    ///
    /// `audio` is a base64 blob that can be large; avoid logging this
    /// variant with `Debug` in production paths.
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioAppend {
        /// Base64-encoded audio bytes.
        audio: String,
    },

    /// Trigger model inference to create a response.
    #[serde(rename = "response.create")]
    ResponseCreate,

    /// Offer a WebRTC media channel for the avatar.
    #[serde(rename = "session.avatar.connect")]
    AvatarConnect {
        /// Base64-encoded offer envelope (`{"type":"offer","sdp":"..."}`).
        client_sdp: String,
    },
}

impl ClientCommand {
    /// The wire discriminator this command serializes to.
    pub fn discriminator(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::InputAudioAppend { .. } => "input_audio_buffer.append",
            Self::ResponseCreate => "response.create",
            Self::AvatarConnect { .. } => "session.avatar.connect",
        }
    }

    /// Serialize to wire JSON with the given client event ID attached.
    pub fn to_wire(&self, event_id: &str) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            let _ = map.insert("event_id".into(), Value::String(event_id.into()));
        }
        serde_json::to_string(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn avatar_connect_wire_shape() {
        let cmd = ClientCommand::AvatarConnect {
            client_sdp: "b64payload".into(),
        };
        let wire = cmd.to_wire("ev_client_1").unwrap();
        let value: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(value["type"], "session.avatar.connect");
        assert_eq!(value["client_sdp"], "b64payload");
        assert_eq!(value["event_id"], "ev_client_1");
    }

    #[test]
    fn response_create_carries_only_tag_and_id() {
        let wire = ClientCommand::ResponseCreate.to_wire("ev_2").unwrap();
        let value: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(
            value,
            json!({"type": "response.create", "event_id": "ev_2"})
        );
    }

    #[test]
    fn session_update_passes_config_through() {
        let cmd = ClientCommand::SessionUpdate {
            session: json!({"voice": "ruby"}),
        };
        let wire = cmd.to_wire("ev_3").unwrap();
        let value: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(value["session"]["voice"], "ruby");
    }
}
