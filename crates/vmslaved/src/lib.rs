//! Command-execution service driven by a remote controller.
//!
//! `vmslaved` connects to a controller's request and response endpoints
//! configured via [`vmslave_config`]. The controller first sends a `setup`
//! message sizing the worker pool, then any number of `command` messages.
//! Each accepted command runs as an external process in one of the pool's
//! slots and ends with exactly one `result` or `exception` message carrying
//! its `requestID`.
//!
//! The [`Slave`] dispatcher owns that protocol. It is a one-way state
//! machine (`unconfigured`, `configured`, `draining`, `stopped`) that refuses
//! commands before setup and after shutdown, reporting such protocol
//! violations back to the controller as `CRITICAL` logging messages rather
//! than failing.
//!
//! ## Timeouts and shutdown
//!
//! Commands may carry a deadline. A single timeout monitor thread tracks all
//! armed deadlines; on expiry the owning slot kills the process and reports
//! `exception: "timeout"`. Completion and expiry race through one atomic
//! state word per request, so a late exit never produces a second terminal
//! message.
//!
//! [`Slave::shutdown`] is cooperative: new commands are refused at once, but
//! queued and running requests are allowed to finish (or time out) before
//! [`Slave::serve_till_shutdown`] returns.

mod bootstrap;
mod forwarder;
mod health;
mod monitor;
mod pool;
mod process;
mod runner;
mod slave;
mod telemetry;
pub mod transport;

pub use bootstrap::{ConfigLoader, StaticConfigLoader, SystemConfigLoader};
pub use forwarder::{LogForwarder, LogSink};
pub use health::{LifecycleReporter, StructuredLifecycleReporter};
pub use monitor::TimeoutMonitor;
pub use pool::{PoolError, PoolServices, RequestOutcome, SubmitError, WorkerPool};
pub use process::{LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_slave};
pub use runner::{ProcessHandle, ProcessOutput, ProcessRunner, RunnerError, SystemProcessRunner};
pub use slave::{Slave, SlaveError, SlaveSettings, SlaveState};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};

#[cfg(test)]
mod tests;
