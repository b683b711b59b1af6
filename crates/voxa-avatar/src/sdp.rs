//! SDP transport encoding for the avatar offer/answer exchange.
//!
//! SDP is multi-line text; the session protocol carries it inside
//! single-line JSON string fields. The offer path escapes CR/LF as literal
//! `\r` `\n` character pairs, wraps the result in a minimal
//! `{"type":"offer","sdp":"..."}` envelope, and base64-encodes the whole
//! envelope. The answer path reverses the same steps on a `{"sdp":"..."}`
//! envelope. Both directions share one escaping scheme so a round trip is
//! lossless.
//!
//! The offer path can also rewrite the SDP's security profile token
//! (`UDP/TLS/RTP/SAVP` → `UDP/TLS/RTP/SAVPF`). The remote service expects
//! the feedback-profile token; the rewrite is configurable because the
//! requirement is environment-specific.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to encode or decode an SDP envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The envelope is not valid base64.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The decoded envelope is not UTF-8.
    #[error("envelope is not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The decoded envelope is not the expected JSON shape.
    #[error("invalid envelope JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Textual substitution applied to the local SDP's transport profile token
/// before the offer is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRewrite {
    /// Token to replace.
    pub from: String,
    /// Replacement token.
    pub to: String,
}

impl Default for ProfileRewrite {
    fn default() -> Self {
        Self {
            from: "UDP/TLS/RTP/SAVP".into(),
            to: "UDP/TLS/RTP/SAVPF".into(),
        }
    }
}

impl ProfileRewrite {
    /// Apply the rewrite to every whitespace-delimited token equal to
    /// `from`.
    ///
    /// Token-exact matching matters: a plain substring replace of `SAVP`
    /// would corrupt lines already carrying `SAVPF`.
    pub fn apply(&self, sdp: &str) -> String {
        // An empty token would match at every position and the scan below
        // would never advance.
        if self.from.is_empty() {
            return sdp.to_owned();
        }
        let mut out = String::with_capacity(sdp.len() + 8);
        let mut rest = sdp;
        while let Some(pos) = rest.find(&self.from) {
            let (before, tail) = rest.split_at(pos);
            out.push_str(before);
            let after = &tail[self.from.len()..];
            let left_ok = out
                .chars()
                .next_back()
                .is_none_or(|c| c.is_whitespace() || c == '=');
            let right_ok = after
                .chars()
                .next()
                .is_none_or(|c| c.is_whitespace() || c == '\\');
            if left_ok && right_ok {
                out.push_str(&self.to);
            } else {
                out.push_str(&self.from);
            }
            rest = after;
        }
        out.push_str(rest);
        out
    }
}

/// Escape CR and LF as literal `\r` and `\n` character pairs for safe
/// single-line embedding.
pub fn escape_sdp(sdp: &str) -> String {
    sdp.replace('\r', "\\r").replace('\n', "\\n")
}

/// Reverse [`escape_sdp`]: turn literal `\r` and `\n` pairs back into CR
/// and LF.
pub fn unescape_sdp(escaped: &str) -> String {
    escaped.replace("\\r", "\r").replace("\\n", "\n")
}

#[derive(Serialize)]
struct OfferEnvelope<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    sdp: &'a str,
}

#[derive(Deserialize)]
struct AnswerEnvelope {
    sdp: String,
}

/// Wrap local SDP in the offer envelope and base64-encode it for the
/// `client_sdp` field of the avatar connect command.
pub fn encode_offer(sdp: &str) -> Result<String, EnvelopeError> {
    let escaped = escape_sdp(sdp);
    let envelope = serde_json::to_string(&OfferEnvelope {
        kind: "offer",
        sdp: &escaped,
    })?;
    Ok(BASE64.encode(envelope))
}

/// Decode the base64 answer envelope from `session.avatar.connecting` into
/// plain SDP text.
pub fn decode_answer(encoded: &str) -> Result<String, EnvelopeError> {
    let bytes = BASE64.decode(encoded.trim())?;
    let text = String::from_utf8(bytes)?;
    let envelope: AnswerEnvelope = serde_json::from_str(&text)?;
    Ok(unescape_sdp(&envelope.sdp))
}

/// Decode a base64 offer envelope back to SDP text.
///
/// Used by tests and loopback tooling; the answer side of a real service
/// never sends offers.
pub fn decode_offer(encoded: &str) -> Result<String, EnvelopeError> {
    let bytes = BASE64.decode(encoded.trim())?;
    let text = String::from_utf8(bytes)?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    let sdp = value.get("sdp").and_then(serde_json::Value::as_str);
    match sdp {
        Some(s) => Ok(unescape_sdp(s)),
        None => Ok(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;

    const SAMPLE_SDP: &str = "v=0\r\no=- 4611731400430051336 2 IN IP4 127.0.0.1\r\nm=video 9 UDP/TLS/RTP/SAVP 96\r\na=rtpmap:96 H264/90000\r\n";

    #[test]
    fn escape_turns_crlf_into_literal_pairs() {
        assert_eq!(escape_sdp("a\r\nb"), "a\\r\\nb");
        assert!(!escape_sdp(SAMPLE_SDP).contains('\n'));
    }

    #[test]
    fn unescape_reverses_escape() {
        assert_eq!(unescape_sdp(&escape_sdp(SAMPLE_SDP)), SAMPLE_SDP);
    }

    #[test]
    fn rewrite_upgrades_savp_token() {
        let rewritten = ProfileRewrite::default().apply(SAMPLE_SDP);
        assert!(rewritten.contains("m=video 9 UDP/TLS/RTP/SAVPF 96"));
        assert!(!rewritten.contains("SAVP "));
    }

    #[test]
    fn rewrite_leaves_savpf_untouched() {
        let already = "m=video 9 UDP/TLS/RTP/SAVPF 96\r\n";
        assert_eq!(ProfileRewrite::default().apply(already), already);
    }

    #[test]
    fn rewrite_with_empty_token_is_a_no_op() {
        let rw = ProfileRewrite {
            from: String::new(),
            to: "X".into(),
        };
        assert_eq!(rw.apply(SAMPLE_SDP), SAMPLE_SDP);
    }

    #[test]
    fn rewrite_handles_token_at_end_of_input() {
        let sdp = "m=video 9 UDP/TLS/RTP/SAVP";
        assert_eq!(
            ProfileRewrite::default().apply(sdp),
            "m=video 9 UDP/TLS/RTP/SAVPF"
        );
    }

    #[test]
    fn offer_envelope_is_base64_json_with_escaped_sdp() {
        use base64::Engine as _;
        let encoded = encode_offer(SAMPLE_SDP).unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&encoded)
            .unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["type"], "offer");
        let sdp = value["sdp"].as_str().unwrap();
        // The JSON string value itself carries literal backslash pairs.
        assert!(sdp.contains("\\r\\n"));
        assert!(!sdp.contains('\n'));
    }

    #[test]
    fn answer_decode_reverses_offer_encoding() {
        // The two envelopes use the same escaping, so encode-as-offer /
        // decode-as-answer is a faithful round trip of the SDP body.
        use base64::Engine as _;
        let escaped = escape_sdp(SAMPLE_SDP);
        let envelope = format!(r#"{{"sdp":"{}"}}"#, escaped.replace('\\', "\\\\"));
        let encoded = base64::engine::general_purpose::STANDARD.encode(envelope);
        assert_eq!(decode_answer(&encoded).unwrap(), SAMPLE_SDP);
    }

    #[test]
    fn offer_round_trips_through_decode_offer() {
        let encoded = encode_offer(SAMPLE_SDP).unwrap();
        assert_eq!(decode_offer(&encoded).unwrap(), SAMPLE_SDP);
    }

    #[test]
    fn malformed_base64_is_an_error_not_a_panic() {
        assert_matches::assert_matches!(
            decode_answer("not base64!!!"),
            Err(EnvelopeError::Base64(_))
        );
    }

    #[test]
    fn non_json_envelope_is_an_error() {
        use base64::Engine as _;
        let encoded = base64::engine::general_purpose::STANDARD.encode("v=0\r\n");
        assert_matches::assert_matches!(decode_answer(&encoded), Err(EnvelopeError::Json(_)));
    }

    proptest! {
        // SDP bodies never contain backslashes, so the escaping scheme is
        // lossless over its real input domain.
        #[test]
        fn escaping_round_trips(body in "[ -\\[\\]-~]{0,64}") {
            let sdp = format!("v=0\r\n{body}\r\nm=video 9 UDP/TLS/RTP/SAVP 96\r\n");
            let encoded = encode_offer(&sdp).unwrap();
            prop_assert_eq!(decode_offer(&encoded).unwrap(), sdp);
        }

        #[test]
        fn rewrite_is_idempotent(sdp in "[ -~\\r\\n]{0,128}") {
            let rw = ProfileRewrite::default();
            let once = rw.apply(&sdp);
            prop_assert_eq!(rw.apply(&once), once.clone());
        }
    }
}
