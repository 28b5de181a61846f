//! Defines the error surface for service launch.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use ortho_config::OrthoError;

use vmslave_config::SocketPreparationError;

use crate::slave::SlaveError;
use crate::telemetry::TelemetryError;
use crate::transport::TransportError;

use super::shutdown::ShutdownError;

/// Errors surfaced while launching or running the service.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry could not be installed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// A configured Unix socket does not exist yet.
    #[error("controller endpoint is not available: {source}")]
    Socket {
        /// Underlying preparation error.
        #[source]
        source: SocketPreparationError,
    },
    /// Connecting to a controller endpoint failed.
    #[error("failed to connect to {channel} endpoint: {source}")]
    Connect {
        /// Which channel was being connected.
        channel: &'static str,
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },
    /// Waiting for shutdown failed.
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
    /// The dispatch loop ended abnormally.
    #[error("dispatch loop failed: {source}")]
    Serve {
        /// Underlying dispatcher error.
        #[source]
        source: SlaveError,
    },
    /// A supervision thread could not be started.
    #[error("failed to start {thread} thread: {source}")]
    Thread {
        /// Name of the thread.
        thread: &'static str,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// A supervision thread panicked.
    #[error("{thread} thread panicked")]
    ThreadPanic {
        /// Name of the thread.
        thread: &'static str,
    },
}

impl From<Arc<OrthoError>> for LaunchError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Config { source }
    }
}

impl From<SocketPreparationError> for LaunchError {
    fn from(source: SocketPreparationError) -> Self {
        Self::Socket { source }
    }
}

impl From<TelemetryError> for LaunchError {
    fn from(source: TelemetryError) -> Self {
        Self::Telemetry { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}

impl From<SlaveError> for LaunchError {
    fn from(source: SlaveError) -> Self {
        Self::Serve { source }
    }
}
