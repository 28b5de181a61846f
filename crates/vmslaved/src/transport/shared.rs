//! Single outbound path shared by the dispatcher, forwarder and slots.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error};

use vmslave_types::Envelope;

use super::{Outbound, TRANSPORT_TARGET, TransportError};

/// Cloneable handle onto the response channel.
///
/// The first send failure is latched: later sends are dropped and the
/// failure is handed to whoever calls [`SharedOutbound::take_failure`].
#[derive(Clone)]
pub struct SharedOutbound {
    inner: Arc<Shared>,
}

struct Shared {
    sink: Box<dyn Outbound>,
    failed: AtomicBool,
    failure: Mutex<Option<TransportError>>,
}

impl SharedOutbound {
    /// Wraps an outbound sink.
    pub fn new(sink: impl Outbound + 'static) -> Self {
        Self {
            inner: Arc::new(Shared {
                sink: Box::new(sink),
                failed: AtomicBool::new(false),
                failure: Mutex::new(None),
            }),
        }
    }

    /// Sends an envelope, latching the first failure.
    ///
    /// Returns `true` when the envelope was handed to the channel.
    pub fn send(&self, envelope: &Envelope) -> bool {
        if self.has_failed() {
            debug!(
                target: TRANSPORT_TARGET,
                kind = %envelope.kind(),
                "dropping envelope after response channel failure"
            );
            return false;
        }
        match self.inner.sink.send(envelope) {
            Ok(()) => true,
            Err(failure) => {
                self.latch(failure);
                false
            }
        }
    }

    /// Returns true once any send has failed.
    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.inner.failed.load(Ordering::Acquire)
    }

    /// Takes the latched failure, if one has not already been taken.
    #[must_use]
    pub fn take_failure(&self) -> Option<TransportError> {
        if !self.has_failed() {
            return None;
        }
        self.inner
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn latch(&self, failure: TransportError) {
        let mut slot = self
            .inner
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.inner.failed.swap(true, Ordering::AcqRel) {
            return;
        }
        error!(
            target: TRANSPORT_TARGET,
            error = %failure,
            "response channel failed"
        );
        *slot = Some(failure);
    }
}

impl fmt::Debug for SharedOutbound {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SharedOutbound")
            .field("failed", &self.has_failed())
            .finish_non_exhaustive()
    }
}
