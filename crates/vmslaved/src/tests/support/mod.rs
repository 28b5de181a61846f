//! Test doubles shared by the unit and behaviour suites.

mod channels;
mod config_loader;
mod controller;
mod mocks;
#[cfg(unix)]
mod processes;
mod quoted;
mod reporter;
mod runner;
mod shutdown;

pub use channels::{InboundSender, MemoryInbound, MemoryOutbound};
pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use controller::Controller;
pub use mocks::{MockLogSink, MockRunner};
#[cfg(unix)]
pub use processes::{PidFile, terminates_in_time};
pub use reporter::{LifecycleEvent, RecordingLifecycleReporter};
pub use quoted::QuotedString;
pub use runner::{FakeBehaviour, FakeRunner};
pub use shutdown::ManualShutdownSignal;

/// Upper bound on how long a test waits for an asynchronous outcome.
pub const PATIENCE: std::time::Duration = std::time::Duration::from_secs(5);
