//! Execution slot driving one request at a time.

use std::sync::Arc;

use tracing::debug;

use vmslave_types::{CommandResult, Envelope, Priority, RequestId};

use crate::runner::{ProcessHandle, ProcessOutput};

use super::request::RequestRecord;
use super::{POOL_TARGET, PoolContext, RequestOutcome};

const TIMEOUT_MESSAGE: &str = "timeout";

pub(crate) struct WorkerSlot {
    index: usize,
    context: Arc<PoolContext>,
}

impl WorkerSlot {
    pub(crate) const fn new(index: usize, context: Arc<PoolContext>) -> Self {
        Self { index, context }
    }

    pub(crate) fn run(self) {
        while let Some(record) = self.next_request() {
            debug!(
                target: POOL_TARGET,
                slot = self.index,
                request_id = %record.request_id(),
                "slot picked up request"
            );
            let (envelope, outcome) = self.execute(&record);
            self.finish(record.request_id(), &envelope, &outcome);
        }
        debug!(target: POOL_TARGET, slot = self.index, "slot exiting");
    }

    fn next_request(&self) -> Option<Arc<RequestRecord>> {
        let mut state = self.context.lock();
        loop {
            if let Some(record) = state.queue.pop_front() {
                state.busy += 1;
                return Some(record);
            }
            if state.closed {
                return None;
            }
            state = self
                .context
                .work_ready
                .wait(state)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    fn execute(&self, record: &Arc<RequestRecord>) -> (Envelope, RequestOutcome) {
        let request_id = record.request_id();
        if let Some(timeout) = record.request().timeout {
            let cancelled = Arc::clone(record);
            self.context.monitor.arm(request_id, timeout, move || {
                cancelled.cancel();
            });
        }

        let mut handle = match self.context.services.runner.spawn(&record.request().command) {
            Ok(handle) => handle,
            Err(error) => {
                self.context.monitor.disarm(request_id);
                return if record.complete() {
                    failed(request_id, error.to_string())
                } else {
                    self.timed_out(record, None)
                };
            }
        };

        loop {
            if record.is_cancelled() {
                return self.timed_out(record, Some(handle.as_mut()));
            }
            match handle.wait_timeout(self.context.process_poll_interval) {
                Ok(None) => {}
                Ok(Some(output)) => {
                    self.context.monitor.disarm(request_id);
                    return if record.complete() {
                        completed(request_id, output)
                    } else {
                        self.timed_out(record, None)
                    };
                }
                Err(error) => {
                    self.context.monitor.disarm(request_id);
                    self.kill(request_id, handle.as_mut());
                    return if record.complete() {
                        failed(request_id, error.to_string())
                    } else {
                        self.timed_out(record, None)
                    };
                }
            }
        }
    }

    fn timed_out(
        &self,
        record: &RequestRecord,
        handle: Option<&mut dyn ProcessHandle>,
    ) -> (Envelope, RequestOutcome) {
        let request_id = record.request_id();
        if let Some(handle) = handle {
            self.kill(request_id, handle);
        }
        let timeout = record.request().timeout.unwrap_or_default();
        self.context.services.log.forward(
            Priority::Warning,
            &format!("request {request_id} exceeded its {timeout:?} timeout and was killed"),
        );
        (
            Envelope::exception(request_id, TIMEOUT_MESSAGE),
            RequestOutcome::TimedOut,
        )
    }

    fn kill(&self, request_id: RequestId, handle: &mut dyn ProcessHandle) {
        if let Err(error) = handle.kill() {
            self.context.services.log.forward(
                Priority::Error,
                &format!("failed to kill process for request {request_id}: {error}"),
            );
        }
    }

    fn finish(&self, request_id: RequestId, envelope: &Envelope, outcome: &RequestOutcome) {
        self.context.lock().in_flight.remove(&request_id);
        self.context.services.outbound.send(envelope);
        self.context
            .services
            .reporter
            .request_finished(request_id, outcome);
        {
            let mut state = self.context.lock();
            state.busy = state.busy.saturating_sub(1);
        }
        self.context.settled.notify_all();
    }
}

fn completed(request_id: RequestId, output: ProcessOutput) -> (Envelope, RequestOutcome) {
    let exit_code = output.exit_code;
    (
        Envelope::Result(CommandResult {
            request_id,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
        }),
        RequestOutcome::Completed { exit_code },
    )
}

fn failed(request_id: RequestId, message: String) -> (Envelope, RequestOutcome) {
    (
        Envelope::exception(request_id, message.as_str()),
        RequestOutcome::Failed { message },
    )
}
