//! Structured lifecycle reporting for the dispatcher and worker pool.
//!
//! These events stay local: they go to `tracing`, never to the controller.

use std::sync::Arc;

use vmslave_types::{CommandRequest, RequestId};

use crate::pool::RequestOutcome;
use crate::transport::TransportError;

const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait LifecycleReporter: Send + Sync {
    /// Invoked after the worker pool has been created.
    fn configured(&self, slots: usize);

    /// Invoked when shutdown is first observed.
    fn draining(&self, busy: usize, pending: usize);

    /// Invoked once the dispatcher has stopped.
    fn stopped(&self);

    /// Invoked when the controller closes the request channel.
    fn inbound_closed(&self);

    /// Invoked when a channel fails irrecoverably.
    fn transport_failed(&self, error: &TransportError);

    /// Invoked when a command has been handed to the worker pool.
    fn request_accepted(&self, request: &CommandRequest);

    /// Invoked after a request's terminal message has been sent.
    fn request_finished(&self, request_id: RequestId, outcome: &RequestOutcome);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter + ?Sized,
{
    fn configured(&self, slots: usize) {
        (**self).configured(slots);
    }

    fn draining(&self, busy: usize, pending: usize) {
        (**self).draining(busy, pending);
    }

    fn stopped(&self) {
        (**self).stopped();
    }

    fn inbound_closed(&self) {
        (**self).inbound_closed();
    }

    fn transport_failed(&self, error: &TransportError) {
        (**self).transport_failed(error);
    }

    fn request_accepted(&self, request: &CommandRequest) {
        (**self).request_accepted(request);
    }

    fn request_finished(&self, request_id: RequestId, outcome: &RequestOutcome) {
        (**self).request_finished(request_id, outcome);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredLifecycleReporter;

impl StructuredLifecycleReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredLifecycleReporter {
    fn configured(&self, slots: usize) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "configured",
            slots,
            "worker pool ready"
        );
    }

    fn draining(&self, busy: usize, pending: usize) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "draining",
            busy,
            pending,
            "shutdown requested, draining in-flight requests"
        );
    }

    fn stopped(&self) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "stopped",
            "dispatcher stopped"
        );
    }

    fn inbound_closed(&self) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "inbound_closed",
            "controller closed the request channel"
        );
    }

    fn transport_failed(&self, error: &TransportError) {
        tracing::error!(
            target: LIFECYCLE_TARGET,
            event = "transport_failed",
            error = %error,
            "channel failed"
        );
    }

    fn request_accepted(&self, request: &CommandRequest) {
        tracing::debug!(
            target: LIFECYCLE_TARGET,
            event = "request_accepted",
            request_id = %request.request_id,
            program = request.program().unwrap_or_default(),
            timeout = ?request.timeout,
            "request accepted"
        );
    }

    fn request_finished(&self, request_id: RequestId, outcome: &RequestOutcome) {
        tracing::debug!(
            target: LIFECYCLE_TARGET,
            event = "request_finished",
            request_id = %request_id,
            outcome = %outcome,
            "request finished"
        );
    }
}
