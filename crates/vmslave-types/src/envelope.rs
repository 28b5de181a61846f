//! Tagged envelope variants and boundary decoding.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::error::EnvelopeError;
use crate::priority::Priority;

/// Correlation identifier chosen by the controller for each command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(i64);

impl RequestId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Discriminant carried in the `type` field of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum EnvelopeKind {
    /// Worker pool configuration.
    Setup,
    /// Command execution request.
    Command,
    /// Forwarded diagnostic event.
    Logging,
    /// Successful command completion.
    Result,
    /// Command failure or timeout.
    Exception,
}

impl EnvelopeKind {
    /// Returns true for kinds the service accepts on its request channel.
    #[must_use]
    pub const fn is_inbound(self) -> bool {
        matches!(self, Self::Setup | Self::Command)
    }
}

/// A single discriminated message crossing the request or response channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    /// Configures the worker pool; accepted once.
    Setup(Setup),
    /// Requests execution of an argument vector.
    Command(CommandRequest),
    /// Diagnostic event forwarded to the controller.
    Logging(LogRecord),
    /// Terminal message for a command that ran to completion.
    Result(CommandResult),
    /// Terminal message for a command that could not run or complete.
    Exception(CommandException),
}

/// Payload of a `setup` envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    /// Number of concurrent execution slots.
    pub num_workers: usize,
}

/// Payload of a `command` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Program followed by its arguments.
    pub command: Vec<String>,
    /// Correlation identifier echoed in the terminal message.
    #[serde(rename = "requestID")]
    pub request_id: RequestId,
    /// Optional execution deadline measured from the moment the process starts.
    #[serde(
        default,
        with = "crate::timeout",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
}

impl CommandRequest {
    /// Builds a request without a deadline.
    #[must_use]
    pub fn new(request_id: RequestId, command: Vec<String>) -> Self {
        Self {
            command,
            request_id,
            timeout: None,
        }
    }

    /// Attaches a deadline to the request.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the program name, if the argument vector is not empty.
    #[must_use]
    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }
}

/// Payload of a `logging` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Severity of the event.
    pub priority: Priority,
    /// Human-readable description.
    pub message: String,
}

/// Payload of a `result` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    /// Identifier of the completed request.
    #[serde(rename = "requestID")]
    pub request_id: RequestId,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Exit status; the negated signal number when killed by a signal.
    pub exit_code: i32,
}

/// Payload of an `exception` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandException {
    /// Identifier of the failed request.
    #[serde(rename = "requestID")]
    pub request_id: RequestId,
    /// Failure description.
    #[serde(rename = "exception")]
    pub message: String,
}

impl Envelope {
    /// Builds a `logging` envelope.
    #[must_use]
    pub fn logging(priority: Priority, message: impl Into<String>) -> Self {
        Self::Logging(LogRecord {
            priority,
            message: message.into(),
        })
    }

    /// Builds an `exception` envelope for the given request.
    #[must_use]
    pub fn exception(request_id: RequestId, message: impl Into<String>) -> Self {
        Self::Exception(CommandException {
            request_id,
            message: message.into(),
        })
    }

    /// Returns the discriminant of this envelope.
    #[must_use]
    pub const fn kind(&self) -> EnvelopeKind {
        match self {
            Self::Setup(_) => EnvelopeKind::Setup,
            Self::Command(_) => EnvelopeKind::Command,
            Self::Logging(_) => EnvelopeKind::Logging,
            Self::Result(_) => EnvelopeKind::Result,
            Self::Exception(_) => EnvelopeKind::Exception,
        }
    }

    /// Returns the correlated request identifier, if the variant carries one.
    #[must_use]
    pub const fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::Command(request) => Some(request.request_id),
            Self::Result(result) => Some(result.request_id),
            Self::Exception(exception) => Some(exception.request_id),
            Self::Setup(_) | Self::Logging(_) => None,
        }
    }

    /// Returns true for messages that end a request's lifecycle.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Result(_) | Self::Exception(_))
    }

    /// Decodes and validates a single frame.
    ///
    /// Trailing whitespace, including the line delimiter, is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError`] when the frame is not a JSON object, has no
    /// string `type`, names an unknown type, or carries missing or invalid
    /// fields for its type.
    pub fn decode(frame: &[u8]) -> Result<Self, EnvelopeError> {
        let trimmed = frame.trim_ascii_end();
        if trimmed.is_empty() {
            return Err(EnvelopeError::malformed("empty frame"));
        }

        let value: Value = serde_json::from_slice(trimmed).map_err(EnvelopeError::from_json)?;
        let Value::Object(fields) = &value else {
            return Err(EnvelopeError::malformed("expected a JSON object"));
        };
        let kind = match fields.get("type") {
            Some(Value::String(kind)) => EnvelopeKind::from_str(kind)
                .map_err(|_| EnvelopeError::UnknownType { kind: kind.clone() })?,
            Some(_) | None => return Err(EnvelopeError::MissingType),
        };

        let envelope: Self = serde_json::from_value(value)
            .map_err(|error| EnvelopeError::invalid(kind, error.to_string()))?;
        envelope.validate()?;
        Ok(envelope)
    }

    /// Serialises the envelope as a newline-terminated JSON line.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Encode`] if serialisation fails.
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        let mut line = serde_json::to_vec(self).map_err(|source| EnvelopeError::Encode {
            kind: self.kind(),
            source,
        })?;
        line.push(b'\n');
        Ok(line)
    }

    fn validate(&self) -> Result<(), EnvelopeError> {
        match self {
            Self::Setup(setup) if setup.num_workers == 0 => Err(EnvelopeError::invalid(
                EnvelopeKind::Setup,
                "numWorkers must be greater than zero",
            )),
            Self::Command(request) if request.command.is_empty() => Err(EnvelopeError::invalid(
                EnvelopeKind::Command,
                "command must contain at least the program name",
            )),
            _ => Ok(()),
        }
    }
}
