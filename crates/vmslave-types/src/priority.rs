//! Severity scale attached to forwarded `logging` envelopes.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Severity of a forwarded diagnostic event.
///
/// On the wire the priority is the conventional numeric level (`DEBUG` = 10
/// up to `CRITICAL` = 50). Configuration sources may also spell the level by
/// name.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[serde(into = "u8", try_from = "PriorityRepr")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Priority {
    /// Verbose diagnostics.
    #[default]
    Debug,
    /// Informational events.
    Info,
    /// Recoverable anomalies.
    Warning,
    /// Failures scoped to a single operation.
    Error,
    /// Protocol violations and other events the controller must see.
    Critical,
}

impl Priority {
    /// Returns the numeric level used on the wire.
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::Debug => 10,
            Self::Info => 20,
            Self::Warning => 30,
            Self::Error => 40,
            Self::Critical => 50,
        }
    }

    /// Maps a numeric level back to its priority.
    #[must_use]
    pub const fn from_level(level: u8) -> Option<Self> {
        match level {
            10 => Some(Self::Debug),
            20 => Some(Self::Info),
            30 => Some(Self::Warning),
            40 => Some(Self::Error),
            50 => Some(Self::Critical),
            _ => None,
        }
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.level()
    }
}

impl TryFrom<u8> for Priority {
    type Error = PriorityError;

    fn try_from(level: u8) -> Result<Self, PriorityError> {
        Self::from_level(level).ok_or(PriorityError::UnknownLevel(level))
    }
}

/// Errors raised when a priority cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriorityError {
    /// Numeric level outside the supported scale.
    #[error("unsupported priority level {0}")]
    UnknownLevel(u8),
    /// Named level that does not match any priority.
    #[error("unsupported priority name '{0}'")]
    UnknownName(String),
}

/// Accepted serialised shapes: the numeric level or its name.
#[derive(Deserialize)]
#[serde(untagged)]
enum PriorityRepr {
    Level(u8),
    Name(String),
}

impl TryFrom<PriorityRepr> for Priority {
    type Error = PriorityError;

    fn try_from(repr: PriorityRepr) -> Result<Self, PriorityError> {
        match repr {
            PriorityRepr::Level(level) => Self::try_from(level),
            PriorityRepr::Name(name) => name
                .parse()
                .map_err(|_| PriorityError::UnknownName(name)),
        }
    }
}
