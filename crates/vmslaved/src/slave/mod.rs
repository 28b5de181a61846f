//! Top-level dispatcher gating command execution on configuration.
//!
//! A [`Slave`] owns the request channel and the single outbound path. Its
//! loop polls for frames with a bounded wait so a concurrent
//! [`Slave::shutdown`] is observed within one poll interval. `setup` creates
//! the worker pool, `command` is handed to it, and everything else becomes a
//! `CRITICAL` diagnostic for the controller. After shutdown the loop keeps
//! running until the pool is quiescent, so every accepted request still
//! produces its terminal message.

mod dispatcher;
mod errors;
mod state;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, TryLockError};
use std::time::Duration;

use tracing::info;

use vmslave_config::{
    Config, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PROCESS_POLL_INTERVAL_MS, default_forward_level,
};
use vmslave_types::Priority;

use crate::forwarder::{LogForwarder, LogSink};
use crate::health::LifecycleReporter;
use crate::runner::ProcessRunner;
use crate::transport::{Inbound, Outbound, SharedOutbound};

use self::dispatcher::Dispatcher;
use self::state::SlaveStatus;

pub use self::errors::SlaveError;
pub use self::state::SlaveState;

const SLAVE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::slave");

/// Timing and forwarding knobs for a [`Slave`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveSettings {
    /// Longest single wait on the request channel.
    pub poll_interval: Duration,
    /// Wait granularity of each execution slot.
    pub process_poll_interval: Duration,
    /// Lowest priority sent to the controller.
    pub forward_level: Priority,
}

impl SlaveSettings {
    /// Extracts the dispatcher settings from a resolved configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            process_poll_interval: config.process_poll_interval(),
            forward_level: config.forward_level(),
        }
    }
}

impl Default for SlaveSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            process_poll_interval: Duration::from_millis(DEFAULT_PROCESS_POLL_INTERVAL_MS),
            forward_level: default_forward_level(),
        }
    }
}

/// Command-execution service bound to a request and a response channel.
///
/// All methods take `&self`, so a slave can be shared through an [`Arc`]:
/// one thread blocks in [`Slave::serve_till_shutdown`] while any other calls
/// [`Slave::shutdown`] or reads [`Slave::state`].
pub struct Slave {
    core: Mutex<Dispatcher>,
    status: SlaveStatus,
}

impl Slave {
    /// Builds an unconfigured slave with the production collaborators.
    ///
    /// Processes are started by the operating system runner and lifecycle
    /// events go to `tracing`. Diagnostics are forwarded on `outbound` at or
    /// above `settings.forward_level`.
    pub fn new(
        inbound: impl Inbound + 'static,
        outbound: impl Outbound + 'static,
        settings: SlaveSettings,
    ) -> Self {
        let outbound = SharedOutbound::new(outbound);
        let log = Arc::new(LogForwarder::new(outbound.clone(), settings.forward_level));
        Self {
            core: Mutex::new(Dispatcher::new(
                Box::new(inbound),
                outbound,
                log,
                settings,
            )),
            status: SlaveStatus::new(),
        }
    }

    /// Replaces the process runner used by the worker pool.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.core_mut().services.runner = runner;
        self
    }

    /// Replaces the lifecycle observer.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn LifecycleReporter>) -> Self {
        self.core_mut().services.reporter = reporter;
        self
    }

    /// Replaces the sink receiving protocol and execution diagnostics.
    #[must_use]
    pub fn with_log_sink(mut self, log: Arc<dyn LogSink>) -> Self {
        self.core_mut().services.log = log;
        self
    }

    /// Runs the dispatch loop until the slave reaches [`SlaveState::Stopped`].
    ///
    /// Returns immediately when the slave has already stopped.
    ///
    /// # Errors
    ///
    /// Returns [`SlaveError`] when either channel fails or when another
    /// thread is already serving.
    pub fn serve_till_shutdown(&self) -> Result<(), SlaveError> {
        let mut core = match self.core.try_lock() {
            Ok(core) => core,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(SlaveError::AlreadyServing),
        };
        if self.status.state() == SlaveState::Stopped {
            return Ok(());
        }
        info!(target: SLAVE_TARGET, "dispatch loop starting");
        core.serve(&self.status)
    }

    /// Requests a graceful drain. Safe to call repeatedly from any thread.
    pub fn shutdown(&self) {
        if self.status.request_shutdown() {
            info!(
                target: SLAVE_TARGET,
                state = %self.status.state(),
                "shutdown requested"
            );
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SlaveState {
        self.status.state()
    }

    fn core_mut(&mut self) -> &mut Dispatcher {
        self.core.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Slave {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Slave")
            .field("state", &self.status.state())
            .field("shutdown_requested", &self.status.shutdown_requested())
            .finish_non_exhaustive()
    }
}
