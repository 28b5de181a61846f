//! Errors raised while decoding or encoding envelopes.

use thiserror::Error;

use crate::envelope::EnvelopeKind;

/// Reasons a frame was rejected at the boundary or could not be encoded.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Frame is not a JSON object.
    #[error("malformed frame: {message}")]
    Malformed {
        /// Description of the failure.
        message: String,
        /// Underlying JSON error, if any.
        #[source]
        source: Option<serde_json::Error>,
    },
    /// Object has no string `type` field.
    #[error("message has no 'type' discriminant")]
    MissingType,
    /// `type` names an unsupported message kind.
    #[error("unknown message type '{kind}'")]
    UnknownType {
        /// The unrecognised discriminant.
        kind: String,
    },
    /// Fields are missing, ill-typed or out of range for the declared kind.
    #[error("invalid {kind} message: {message}")]
    InvalidFields {
        /// Declared kind of the frame.
        kind: EnvelopeKind,
        /// Description of the offending field.
        message: String,
    },
    /// Serialising an outbound envelope failed.
    #[error("failed to encode {kind} message: {source}")]
    Encode {
        /// Kind of the envelope being encoded.
        kind: EnvelopeKind,
        /// Underlying serialisation error.
        #[source]
        source: serde_json::Error,
    },
}

impl EnvelopeError {
    /// Creates a malformed-frame error with a custom message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a malformed-frame error from a JSON parse failure.
    #[must_use]
    pub fn from_json(source: serde_json::Error) -> Self {
        Self::Malformed {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates an invalid-fields error for the given kind.
    pub fn invalid(kind: EnvelopeKind, message: impl Into<String>) -> Self {
        Self::InvalidFields {
            kind,
            message: message.into(),
        }
    }
}
