//! Lifecycle state of the dispatcher.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Position of a [`Slave`](super::Slave) in its one-way lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlaveState {
    /// Waiting for a `setup` message.
    Unconfigured,
    /// Worker pool exists; commands are accepted.
    Configured,
    /// Shutdown observed; in-flight work is finishing.
    Draining,
    /// Loop has exited; nothing further is accepted.
    Stopped,
}

impl SlaveState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Unconfigured => 0,
            Self::Configured => 1,
            Self::Draining => 2,
            Self::Stopped => 3,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Unconfigured,
            1 => Self::Configured,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }

    /// Lowercase label used in telemetry.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Configured => "configured",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SlaveState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// State readable from any thread while the dispatcher owns all writes.
#[derive(Debug)]
pub(crate) struct SlaveStatus {
    state: AtomicU8,
    shutdown_requested: AtomicBool,
}

impl SlaveStatus {
    pub(crate) const fn new() -> Self {
        Self {
            state: AtomicU8::new(SlaveState::Unconfigured.as_u8()),
            shutdown_requested: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> SlaveState {
        SlaveState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves forward to `next`; earlier states are never re-entered.
    pub(crate) fn advance(&self, next: SlaveState) {
        self.state.fetch_max(next.as_u8(), Ordering::AcqRel);
    }

    pub(crate) fn request_shutdown(&self) -> bool {
        !self.shutdown_requested.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }
}
