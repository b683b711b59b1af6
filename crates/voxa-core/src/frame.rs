//! Parsed-but-untyped inbound wire frames.
//!
//! Every message on the session protocol is a JSON object with a required
//! string field `type` (the discriminator) and an optional string field
//! `event_id`. [`RawFrame`] holds the parsed value and exposes those two
//! fields without committing to any payload shape; type-specific decoding is
//! the registry's job.

use serde_json::Value;

use crate::errors::DecodeError;

/// One inbound wire message, parsed as JSON but not yet decoded.
///
/// Transient by design: produced by the transport, consumed immediately by
/// the decoder registry, retained only inside `SessionUpdate::Unknown` for
/// diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    value: Value,
}

impl RawFrame {
    /// Wrap an already-parsed JSON value.
    ///
    /// Fails when the value is not an object or its `type` field is missing
    /// or not a string — such a value cannot be dispatched.
    pub fn new(value: Value) -> Result<Self, DecodeError> {
        match value.get("type") {
            Some(Value::String(_)) => Ok(Self { value }),
            Some(_) => Err(DecodeError::BadDiscriminator),
            None => Err(DecodeError::MissingDiscriminator),
        }
    }

    /// Parse one wire message from JSON text.
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text)?;
        Self::new(value)
    }

    /// The `type` discriminator of this frame.
    pub fn discriminator(&self) -> &str {
        // Guaranteed present and a string by the constructor.
        match self.value.get("type") {
            Some(Value::String(s)) => s,
            _ => unreachable!("RawFrame invariant: `type` is a string"),
        }
    }

    /// The optional `event_id` field, if present and a string.
    pub fn event_id(&self) -> Option<&str> {
        self.value.get("event_id").and_then(Value::as_str)
    }

    /// Borrow the underlying JSON value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consume the frame, returning the underlying JSON value.
    pub fn into_value(self) -> Value {
        self.value
    }
}
