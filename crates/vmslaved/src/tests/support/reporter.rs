//! Test double for [`LifecycleReporter`] that records events for assertions.

use std::sync::Mutex;

use vmslave_types::{CommandRequest, RequestId};

use crate::health::LifecycleReporter;
use crate::pool::RequestOutcome;
use crate::transport::TransportError;

/// Lifecycle events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Configured(usize),
    Draining { busy: usize, pending: usize },
    Stopped,
    InboundClosed,
    TransportFailed(String),
    Accepted(RequestId),
    Finished(RequestId, RequestOutcome),
}

/// Records lifecycle events.
#[derive(Debug, Default)]
pub struct RecordingLifecycleReporter {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingLifecycleReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .push(event);
    }
}

impl LifecycleReporter for RecordingLifecycleReporter {
    fn configured(&self, slots: usize) {
        self.record(LifecycleEvent::Configured(slots));
    }

    fn draining(&self, busy: usize, pending: usize) {
        self.record(LifecycleEvent::Draining { busy, pending });
    }

    fn stopped(&self) {
        self.record(LifecycleEvent::Stopped);
    }

    fn inbound_closed(&self) {
        self.record(LifecycleEvent::InboundClosed);
    }

    fn transport_failed(&self, error: &TransportError) {
        self.record(LifecycleEvent::TransportFailed(error.to_string()));
    }

    fn request_accepted(&self, request: &CommandRequest) {
        self.record(LifecycleEvent::Accepted(request.request_id));
    }

    fn request_finished(&self, request_id: RequestId, outcome: &RequestOutcome) {
        self.record(LifecycleEvent::Finished(request_id, outcome.clone()));
    }
}
