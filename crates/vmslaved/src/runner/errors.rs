//! Error types for process execution.

use std::io;

use thiserror::Error;

/// Errors raised while starting or supervising a process.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The argument vector was empty.
    #[error("command is empty")]
    EmptyCommand,
    /// The OS refused to start the program.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// Polling the process for exit failed.
    #[error("failed to wait for '{program}': {source}")]
    Wait {
        /// Program being waited on.
        program: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// Terminating the process failed.
    #[error("failed to kill '{program}': {source}")]
    Kill {
        /// Program being terminated.
        program: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// Reading a captured stream failed.
    #[error("failed to capture {stream} of '{program}': {source}")]
    Capture {
        /// Program whose output was being read.
        program: String,
        /// Stream name.
        stream: &'static str,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The thread draining a captured stream panicked.
    #[error("{stream} reader for '{program}' panicked")]
    ReaderPanicked {
        /// Program whose output was being read.
        program: String,
        /// Stream name.
        stream: &'static str,
    },
}

impl RunnerError {
    /// Builds a spawn error for `program`.
    pub fn spawn(program: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }
}
