//! Bounded worker pool executing commands.
//!
//! The pool owns a fixed number of slot threads created at configuration
//! time. [`WorkerPool::submit`] never blocks: requests wait in a FIFO queue
//! until a slot is free. Every accepted request produces exactly one
//! terminal envelope on the shared outbound path.

mod request;
mod slot;

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::warn;

use vmslave_types::{CommandRequest, RequestId};

use crate::forwarder::LogSink;
use crate::health::LifecycleReporter;
use crate::monitor::TimeoutMonitor;
use crate::runner::ProcessRunner;
use crate::transport::SharedOutbound;

use self::request::RequestRecord;
use self::slot::WorkerSlot;

const POOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pool");

/// How a request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The process exited on its own; a `result` envelope was sent.
    Completed {
        /// Reported exit code.
        exit_code: i32,
    },
    /// The process could not be started or supervised.
    Failed {
        /// Message carried in the `exception` envelope.
        message: String,
    },
    /// The deadline passed and the process was killed.
    TimedOut,
}

impl fmt::Display for RequestOutcome {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { exit_code } => write!(formatter, "completed (exit code {exit_code})"),
            Self::Failed { message } => write!(formatter, "failed: {message}"),
            Self::TimedOut => formatter.write_str("timed out"),
        }
    }
}

/// Collaborators shared by every slot.
#[derive(Clone)]
pub struct PoolServices {
    /// Starts processes.
    pub runner: Arc<dyn ProcessRunner>,
    /// Path for terminal envelopes.
    pub outbound: SharedOutbound,
    /// Sink for diagnostics raised by slots.
    pub log: Arc<dyn LogSink>,
    /// Observer for request lifecycle events.
    pub reporter: Arc<dyn LifecycleReporter>,
}

/// Errors raised while creating the pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// A pool needs at least one slot.
    #[error("worker pool requires at least one slot")]
    NoSlots,
    /// A pool thread could not be started.
    #[error("failed to start {thread} thread: {source}")]
    Spawn {
        /// Thread that failed to start.
        thread: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}

/// Reasons a submission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// A request with the same identifier is queued or running.
    #[error("duplicate requestID {0} is already in flight")]
    Duplicate(RequestId),
    /// The pool has been closed.
    #[error("worker pool is closed")]
    Closed,
}

#[derive(Default)]
struct PoolState {
    queue: VecDeque<Arc<RequestRecord>>,
    in_flight: HashSet<RequestId>,
    busy: usize,
    closed: bool,
}

impl PoolState {
    fn is_quiescent(&self) -> bool {
        self.queue.is_empty() && self.busy == 0
    }
}

pub(crate) struct PoolContext {
    state: Mutex<PoolState>,
    work_ready: Condvar,
    settled: Condvar,
    services: PoolServices,
    monitor: TimeoutMonitor,
    process_poll_interval: Duration,
}

impl PoolContext {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) {
        self.lock().closed = true;
        self.work_ready.notify_all();
    }
}

/// Fixed set of execution slots plus their pending queue.
pub struct WorkerPool {
    context: Arc<PoolContext>,
    slots: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `slots` slot threads and the timeout monitor.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError`] when `slots` is zero or a thread cannot start.
    pub fn start(
        slots: usize,
        process_poll_interval: Duration,
        services: PoolServices,
    ) -> Result<Self, PoolError> {
        if slots == 0 {
            return Err(PoolError::NoSlots);
        }
        let monitor = TimeoutMonitor::start().map_err(|source| PoolError::Spawn {
            thread: String::from("timeout monitor"),
            source,
        })?;
        let context = Arc::new(PoolContext {
            state: Mutex::new(PoolState::default()),
            work_ready: Condvar::new(),
            settled: Condvar::new(),
            services,
            monitor,
            process_poll_interval,
        });

        let mut pool = Self {
            context,
            slots: Vec::with_capacity(slots),
        };
        for index in 0..slots {
            let slot = WorkerSlot::new(index, Arc::clone(&pool.context));
            let name = format!("vmslave-slot-{index}");
            match thread::Builder::new().name(name.clone()).spawn(move || slot.run()) {
                Ok(handle) => pool.slots.push(handle),
                Err(source) => {
                    pool.close();
                    return Err(PoolError::Spawn {
                        thread: name,
                        source,
                    });
                }
            }
        }
        Ok(pool)
    }

    /// Queues a request for execution without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Duplicate`] when the identifier is already in
    /// flight and [`SubmitError::Closed`] after the pool has closed.
    pub fn submit(&self, request: CommandRequest) -> Result<(), SubmitError> {
        let request_id = request.request_id;
        {
            let mut state = self.context.lock();
            if state.closed {
                return Err(SubmitError::Closed);
            }
            if !state.in_flight.insert(request_id) {
                return Err(SubmitError::Duplicate(request_id));
            }
            state
                .queue
                .push_back(Arc::new(RequestRecord::new(request)));
        }
        self.context.work_ready.notify_one();
        Ok(())
    }

    /// Number of slots.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently executing a request.
    #[must_use]
    pub fn busy_count(&self) -> usize {
        self.context.lock().busy
    }

    /// Number of requests waiting for a slot.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.context.lock().queue.len()
    }

    /// Number of slots free to take work.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.slot_count().saturating_sub(self.busy_count())
    }

    /// True when no slot is busy and nothing is queued.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.context.lock().is_quiescent()
    }

    /// Blocks for at most `timeout` waiting for quiescence.
    ///
    /// Returns whether the pool is quiescent on return.
    pub fn wait_quiescent(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.context.lock();
        loop {
            if state.is_quiescent() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            state = self
                .context
                .settled
                .wait_timeout(state, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    /// Closes the pool and joins every slot.
    ///
    /// Requests still queued are executed before the slots exit.
    pub fn close(&mut self) {
        self.context.close();
        for handle in self.slots.drain(..) {
            if handle.join().is_err() {
                warn!(target: POOL_TARGET, "worker slot panicked");
            }
        }
        self.context.monitor.close();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Slots finish their current and queued work, then exit on their own.
        self.context.close();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.context.lock();
        formatter
            .debug_struct("WorkerPool")
            .field("slots", &self.slots.len())
            .field("busy", &state.busy)
            .field("pending", &state.queue.len())
            .field("closed", &state.closed)
            .finish()
    }
}
