//! Process execution behind a spawn/wait/kill contract.
//!
//! The worker pool never touches `std::process` directly. It asks a
//! [`ProcessRunner`] to start an argument vector and then drives the
//! returned [`ProcessHandle`] with short bounded waits, so cancellation can
//! be observed between waits.

mod errors;
mod system;

use std::time::Duration;

pub use self::errors::RunnerError;
pub use self::system::SystemProcessRunner;

/// Captured outcome of a process that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Bytes written to standard output.
    pub stdout: Vec<u8>,
    /// Bytes written to standard error.
    pub stderr: Vec<u8>,
    /// Exit status; the negated signal number when killed by a signal.
    pub exit_code: i32,
}

/// Starts processes for the worker pool.
pub trait ProcessRunner: Send + Sync {
    /// Spawns `command[0]` with the remaining elements as arguments.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] when the process cannot be started.
    fn spawn(&self, command: &[String]) -> Result<Box<dyn ProcessHandle>, RunnerError>;
}

/// Control over one running process.
pub trait ProcessHandle: Send {
    /// OS process identifier, when one exists.
    fn id(&self) -> Option<u32>;

    /// Waits at most `wait` for the process to exit and its output to close.
    ///
    /// Returns `Ok(None)` while the process is still running, or while a
    /// descendant keeps its output streams open.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] when the process state or its output cannot
    /// be collected.
    fn wait_timeout(&mut self, wait: Duration) -> Result<Option<ProcessOutput>, RunnerError>;

    /// Forcibly terminates the process and its descendants, then reaps it.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] when the process cannot be signalled or
    /// reaped.
    fn kill(&mut self) -> Result<(), RunnerError>;
}
