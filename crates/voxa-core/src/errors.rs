//! Shared error types for the dispatch layer.
//!
//! Layer boundaries each get their own error enum further up the stack
//! (`voxa-avatar` and `voxa-client` define their own); this module holds only
//! the errors the foundation types themselves can produce.

use thiserror::Error;

/// Failure to turn wire JSON into a typed event.
///
/// Distinct from the "unregistered discriminator" case, which is not an error
/// at all — the registry reports that as `None` and the normalizer degrades
/// it to `SessionUpdate::Unknown`.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame has no `type` field.
    #[error("frame has no `type` field")]
    MissingDiscriminator,

    /// The frame's `type` field is not a string.
    #[error("frame `type` field is not a string")]
    BadDiscriminator,

    /// The discriminator is registered but the payload does not match the
    /// expected shape.
    #[error("payload for `{discriminator}` does not match expected shape: {source}")]
    Shape {
        /// The discriminator whose decoder rejected the payload.
        discriminator: String,
        /// The underlying serde failure.
        #[source]
        source: serde_json::Error,
    },

    /// JSON-level parse failure.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure returned by one subscriber callback during dispatch.
///
/// Carried opaquely: dispatch aggregates these per subscriber and hands the
/// collection back to its caller without interpreting them.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Create a handler error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_error_names_discriminator() {
        let source = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        let err = DecodeError::Shape {
            discriminator: "session.created".into(),
            source,
        };
        assert!(err.to_string().contains("session.created"));
    }

    #[test]
    fn handler_error_display() {
        let err = HandlerError::new("subscriber panicked on delta");
        assert_eq!(err.to_string(), "subscriber panicked on delta");
    }
}
