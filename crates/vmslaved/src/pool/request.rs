//! In-flight request records.

use std::sync::atomic::{AtomicU8, Ordering};

use vmslave_types::{CommandRequest, RequestId};

const RUNNING: u8 = 0;
const COMPLETED: u8 = 1;
const CANCELLED: u8 = 2;

/// Request state shared between its slot and the timeout monitor.
///
/// The state word is the single arbitration point for the
/// completion-versus-timeout race: whichever side moves it out of
/// `RUNNING` first decides the terminal message.
#[derive(Debug)]
pub(crate) struct RequestRecord {
    request: CommandRequest,
    state: AtomicU8,
}

impl RequestRecord {
    pub(crate) const fn new(request: CommandRequest) -> Self {
        Self {
            request,
            state: AtomicU8::new(RUNNING),
        }
    }

    pub(crate) const fn request(&self) -> &CommandRequest {
        &self.request
    }

    pub(crate) const fn request_id(&self) -> RequestId {
        self.request.request_id
    }

    /// Claims the request for normal completion.
    pub(crate) fn complete(&self) -> bool {
        self.transition(COMPLETED)
    }

    /// Claims the request for cancellation.
    pub(crate) fn cancel(&self) -> bool {
        self.transition(CANCELLED)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    fn transition(&self, target: u8) -> bool {
        self.state
            .compare_exchange(RUNNING, target, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
