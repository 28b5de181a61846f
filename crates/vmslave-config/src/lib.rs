//! Shared configuration for the `vmslaved` command-execution service.
//!
//! Values are layered by `ortho_config`: built-in defaults, then an optional
//! configuration file, then `VMSLAVE_*` environment variables, then
//! command-line flags. The resolved [`Config`] names the two channel
//! endpoints the service connects to, the telemetry settings, and the
//! polling intervals that bound shutdown and timeout latency.

mod defaults;
mod logging;
mod socket;

use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

use vmslave_types::Priority;

pub use defaults::{
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_PROCESS_POLL_INTERVAL_MS, DEFAULT_REQUEST_PORT,
    DEFAULT_RESPONSE_PORT, default_request_endpoint, default_response_endpoint,
    default_runtime_directory,
};
pub use logging::{
    DEFAULT_LOG_FILTER, LogFormat, LogFormatParseError, default_forward_level,
    default_log_filter, default_log_format,
};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "VMSLAVE")]
pub struct Config {
    /// Endpoint the service reads `setup` and `command` envelopes from.
    #[ortho_config(default = defaults::default_request_endpoint())]
    pub request_endpoint: SocketEndpoint,
    /// Endpoint the service writes results, exceptions and logging to.
    #[ortho_config(default = defaults::default_response_endpoint())]
    pub response_endpoint: SocketEndpoint,
    /// `tracing-subscriber` filter directive for local logging.
    #[ortho_config(default = logging::default_log_filter_string())]
    pub log_filter: String,
    /// Output format for local logging.
    #[ortho_config(default = logging::default_log_format())]
    pub log_format: LogFormat,
    /// Upper bound, in milliseconds, on a single inbound poll.
    #[ortho_config(default = defaults::DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,
    /// Granularity, in milliseconds, at which slots check their process.
    #[ortho_config(default = defaults::DEFAULT_PROCESS_POLL_INTERVAL_MS)]
    pub process_poll_interval_ms: u64,
    /// Lowest priority forwarded to the controller as a `logging` envelope.
    #[ortho_config(default = logging::default_forward_level())]
    pub forward_level: Priority,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_endpoint: defaults::default_request_endpoint(),
            response_endpoint: defaults::default_response_endpoint(),
            log_filter: logging::default_log_filter_string(),
            log_format: logging::default_log_format(),
            poll_interval_ms: defaults::DEFAULT_POLL_INTERVAL_MS,
            process_poll_interval_ms: defaults::DEFAULT_PROCESS_POLL_INTERVAL_MS,
            forward_level: logging::default_forward_level(),
        }
    }
}

impl Config {
    /// Resolves the configuration from every layer, reading flags from the
    /// process arguments.
    ///
    /// # Errors
    ///
    /// Returns the `ortho_config` error when any layer fails to parse or
    /// merge.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load()
    }

    /// Endpoint carrying inbound envelopes.
    #[must_use]
    pub const fn request_endpoint(&self) -> &SocketEndpoint {
        &self.request_endpoint
    }

    /// Endpoint carrying outbound envelopes.
    #[must_use]
    pub const fn response_endpoint(&self) -> &SocketEndpoint {
        &self.response_endpoint
    }

    /// Filter expression for the local tracing subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Output format for the local tracing subscriber.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Maximum time a single inbound poll may block.
    ///
    /// Zero is clamped to one millisecond so the dispatcher never spins.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Interval at which execution slots re-check their process.
    #[must_use]
    pub fn process_poll_interval(&self) -> Duration {
        Duration::from_millis(self.process_poll_interval_ms.max(1))
    }

    /// Lowest priority forwarded to the controller.
    #[must_use]
    pub const fn forward_level(&self) -> Priority {
        self.forward_level
    }
}
