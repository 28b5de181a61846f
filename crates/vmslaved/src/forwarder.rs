//! Forwarding of diagnostic events to the controller.
//!
//! Components never log to the controller through ambient state; they are
//! handed a [`LogSink`] and call it directly. The production sink,
//! [`LogForwarder`], mirrors each event to `tracing` and sends a `logging`
//! envelope before returning, so a diagnostic raised while handling one
//! frame is on the wire before the next frame is read.

use vmslave_types::{Envelope, Priority};

use crate::transport::SharedOutbound;

const FORWARD_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::forwarder");

/// Receiver of diagnostic events raised inside the service.
pub trait LogSink: Send + Sync {
    /// Forwards a single event.
    fn forward(&self, priority: Priority, message: &str);
}

/// Sends diagnostic events to the controller as `logging` envelopes.
#[derive(Debug, Clone)]
pub struct LogForwarder {
    outbound: SharedOutbound,
    threshold: Priority,
}

impl LogForwarder {
    /// Builds a forwarder that drops events below `threshold`.
    #[must_use]
    pub const fn new(outbound: SharedOutbound, threshold: Priority) -> Self {
        Self {
            outbound,
            threshold,
        }
    }

    /// Lowest priority that reaches the controller.
    #[must_use]
    pub const fn threshold(&self) -> Priority {
        self.threshold
    }
}

impl LogSink for LogForwarder {
    fn forward(&self, priority: Priority, message: &str) {
        mirror(priority, message);
        if priority >= self.threshold {
            self.outbound.send(&Envelope::logging(priority, message));
        }
    }
}

fn mirror(priority: Priority, message: &str) {
    match priority {
        Priority::Debug => tracing::debug!(target: FORWARD_TARGET, %priority, "{message}"),
        Priority::Info => tracing::info!(target: FORWARD_TARGET, %priority, "{message}"),
        Priority::Warning => tracing::warn!(target: FORWARD_TARGET, %priority, "{message}"),
        Priority::Error | Priority::Critical => {
            tracing::error!(target: FORWARD_TARGET, %priority, "{message}");
        }
    }
}
