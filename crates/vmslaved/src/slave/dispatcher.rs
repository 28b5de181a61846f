//! The dispatch loop behind [`Slave`](super::Slave).

use std::sync::Arc;

use tracing::{debug, warn};

use vmslave_types::{CommandRequest, Envelope, Priority, Setup};

use crate::forwarder::LogSink;
use crate::health::StructuredLifecycleReporter;
use crate::pool::{PoolServices, SubmitError, WorkerPool};
use crate::runner::SystemProcessRunner;
use crate::transport::{Inbound, InboundEvent, SharedOutbound, TransportError};

use super::state::{SlaveState, SlaveStatus};
use super::{SLAVE_TARGET, SlaveError, SlaveSettings};

pub(super) struct Dispatcher {
    inbound: Box<dyn Inbound>,
    pub(super) services: PoolServices,
    settings: SlaveSettings,
    pool: Option<WorkerPool>,
    inbound_closed: bool,
}

impl Dispatcher {
    pub(super) fn new(
        inbound: Box<dyn Inbound>,
        outbound: SharedOutbound,
        log: Arc<dyn LogSink>,
        settings: SlaveSettings,
    ) -> Self {
        Self {
            inbound,
            services: PoolServices {
                runner: Arc::new(SystemProcessRunner::new()),
                outbound,
                log,
                reporter: Arc::new(StructuredLifecycleReporter::new()),
            },
            settings,
            pool: None,
            inbound_closed: false,
        }
    }

    pub(super) fn serve(&mut self, status: &SlaveStatus) -> Result<(), SlaveError> {
        loop {
            if status.shutdown_requested() {
                self.begin_drain(status);
            }
            if let Some(source) = self.services.outbound.take_failure() {
                self.abort(status, &source);
                return Err(SlaveError::Outbound { source });
            }
            if status.state() == SlaveState::Stopped {
                return Ok(());
            }
            if status.state() == SlaveState::Draining && self.is_quiescent() {
                self.stop(status);
                continue;
            }

            if self.inbound_closed {
                self.await_pool();
                continue;
            }
            match self.inbound.receive(self.settings.poll_interval) {
                Ok(InboundEvent::Frame(frame)) => self.handle_frame(&frame, status),
                Ok(InboundEvent::Idle) => {}
                Ok(InboundEvent::Closed) => {
                    self.inbound_closed = true;
                    self.services.reporter.inbound_closed();
                    status.request_shutdown();
                }
                Err(source) => {
                    self.abort(status, &source);
                    return Err(SlaveError::Inbound { source });
                }
            }
        }
    }

    fn handle_frame(&mut self, frame: &[u8], status: &SlaveStatus) {
        match Envelope::decode(frame) {
            Ok(Envelope::Setup(setup)) => self.configure(setup, status),
            Ok(Envelope::Command(request)) => self.accept(request, status),
            Ok(other) => self.critical(&format!(
                "unrecognized message: '{}' is not accepted on the request channel",
                other.kind()
            )),
            Err(error) => self.critical(&format!("unrecognized message: {error}")),
        }
    }

    /// Starts the pool for `setup`; a pool that fails to start leaves the
    /// slave unconfigured so the controller may retry.
    pub(super) fn configure(&mut self, setup: Setup, status: &SlaveStatus) {
        if status.state() != SlaveState::Unconfigured {
            self.critical("setup received after configuration");
            return;
        }
        let pool = match WorkerPool::start(
            setup.num_workers,
            self.settings.process_poll_interval,
            self.services.clone(),
        ) {
            Ok(pool) => pool,
            Err(error) => {
                warn!(target: SLAVE_TARGET, %error, "worker pool did not start");
                self.critical(&format!("failed to start worker pool: {error}"));
                return;
            }
        };
        self.pool = Some(pool);
        status.advance(SlaveState::Configured);
        self.services.reporter.configured(setup.num_workers);
    }

    fn accept(&self, request: CommandRequest, status: &SlaveStatus) {
        let request_id = request.request_id;
        let pool = match (status.state(), self.pool.as_ref()) {
            (SlaveState::Configured, Some(pool)) => pool,
            (SlaveState::Unconfigured, _) => {
                self.critical(&format!(
                    "command received before setup (requestID {request_id})"
                ));
                return;
            }
            _ => {
                self.critical(&format!(
                    "command received after shutdown (requestID {request_id})"
                ));
                return;
            }
        };
        match pool.submit(request.clone()) {
            Ok(()) => self.services.reporter.request_accepted(&request),
            Err(error @ SubmitError::Duplicate(_)) => self.critical(&error.to_string()),
            Err(SubmitError::Closed) => self.critical(&format!(
                "command received after shutdown (requestID {request_id})"
            )),
        }
    }

    fn begin_drain(&mut self, status: &SlaveStatus) {
        match status.state() {
            SlaveState::Unconfigured => self.stop(status),
            SlaveState::Configured => {
                status.advance(SlaveState::Draining);
                let (busy, pending) = self
                    .pool
                    .as_ref()
                    .map_or((0, 0), |pool| (pool.busy_count(), pool.pending_count()));
                self.services.reporter.draining(busy, pending);
            }
            SlaveState::Draining | SlaveState::Stopped => {}
        }
    }

    fn is_quiescent(&self) -> bool {
        self.pool.as_ref().is_none_or(WorkerPool::is_quiescent)
    }

    fn await_pool(&self) {
        match &self.pool {
            Some(pool) => {
                pool.wait_quiescent(self.settings.poll_interval);
            }
            None => debug!(target: SLAVE_TARGET, "no worker pool to drain"),
        }
    }

    fn stop(&mut self, status: &SlaveStatus) {
        if let Some(mut pool) = self.pool.take() {
            debug!(
                target: SLAVE_TARGET,
                slots = pool.slot_count(),
                "closing quiescent worker pool"
            );
            pool.close();
        }
        status.advance(SlaveState::Stopped);
        self.services.reporter.stopped();
    }

    fn abort(&mut self, status: &SlaveStatus, source: &TransportError) {
        self.services.reporter.transport_failed(source);
        // Slots are not joined: they finish their queue and exit on their own.
        self.pool = None;
        status.advance(SlaveState::Stopped);
    }

    fn critical(&self, message: &str) {
        self.services.log.forward(Priority::Critical, message);
    }
}
