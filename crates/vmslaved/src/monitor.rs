//! Per-request deadline tracking.
//!
//! A single timer thread owns every armed deadline. Expired callbacks are
//! removed under the lock and invoked after it is released, so `disarm`
//! racing an expiry observes exactly one winner: either it removes the
//! entry first and the callback never runs, or it finds nothing and
//! returns `false`.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use vmslave_types::RequestId;

const MONITOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::monitor");

type ExpiryCallback = Box<dyn FnOnce() + Send>;

struct Timer {
    deadline: Instant,
    on_expire: ExpiryCallback,
}

#[derive(Default)]
struct MonitorState {
    timers: HashMap<RequestId, Timer>,
    closed: bool,
}

struct MonitorShared {
    state: Mutex<MonitorState>,
    wakeup: Condvar,
}

impl MonitorShared {
    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fires one-shot callbacks when request deadlines pass.
pub struct TimeoutMonitor {
    shared: Arc<MonitorShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TimeoutMonitor {
    /// Starts the timer thread.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn start() -> io::Result<Self> {
        let shared = Arc::new(MonitorShared {
            state: Mutex::new(MonitorState::default()),
            wakeup: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(String::from("vmslave-timeouts"))
            .spawn(move || run_timers(&worker_shared))?;
        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Arms a deadline `duration` from now for `request_id`.
    ///
    /// `on_expire` runs at most once, on the timer thread, unless
    /// [`TimeoutMonitor::disarm`] removes it first. Re-arming an identifier
    /// replaces the previous timer. Arming after [`TimeoutMonitor::close`]
    /// is ignored.
    pub fn arm<F>(&self, request_id: RequestId, duration: Duration, on_expire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let deadline = Instant::now()
            .checked_add(duration)
            .unwrap_or_else(far_future);
        let mut state = self.shared.lock();
        if state.closed {
            warn!(
                target: MONITOR_TARGET,
                request_id = %request_id,
                "deadline armed after monitor closed; ignoring"
            );
            return;
        }
        state.timers.insert(
            request_id,
            Timer {
                deadline,
                on_expire: Box::new(on_expire),
            },
        );
        drop(state);
        self.shared.wakeup.notify_one();
    }

    /// Cancels the deadline for `request_id`.
    ///
    /// Returns `true` when a pending timer was removed, `false` when none
    /// was armed or it has already fired.
    pub fn disarm(&self, request_id: RequestId) -> bool {
        let removed = self.shared.lock().timers.remove(&request_id).is_some();
        if removed {
            self.shared.wakeup.notify_one();
        }
        removed
    }

    /// Number of timers currently armed.
    #[must_use]
    pub fn armed(&self) -> usize {
        self.shared.lock().timers.len()
    }

    /// Stops the timer thread, discarding any armed timers.
    pub fn close(&self) {
        {
            let mut state = self.shared.lock();
            state.closed = true;
            state.timers.clear();
        }
        self.shared.wakeup.notify_all();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker
            && worker.join().is_err()
        {
            warn!(target: MONITOR_TARGET, "timer thread panicked");
        }
    }
}

impl Drop for TimeoutMonitor {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for TimeoutMonitor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TimeoutMonitor")
            .field("armed", &self.armed())
            .finish_non_exhaustive()
    }
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(60 * 60 * 24 * 365)
}

fn run_timers(shared: &MonitorShared) {
    let mut state = shared.lock();
    loop {
        if state.closed {
            return;
        }
        let now = Instant::now();
        let expired: Vec<RequestId> = state
            .timers
            .iter()
            .filter(|(_, timer)| timer.deadline <= now)
            .map(|(request_id, _)| *request_id)
            .collect();
        if !expired.is_empty() {
            let callbacks: Vec<(RequestId, ExpiryCallback)> = expired
                .into_iter()
                .filter_map(|request_id| {
                    state
                        .timers
                        .remove(&request_id)
                        .map(|timer| (request_id, timer.on_expire))
                })
                .collect();
            drop(state);
            for (request_id, on_expire) in callbacks {
                debug!(
                    target: MONITOR_TARGET,
                    request_id = %request_id,
                    "deadline expired"
                );
                on_expire();
            }
            state = shared.lock();
            continue;
        }

        let next = state.timers.values().map(|timer| timer.deadline).min();
        state = match next {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(now);
                shared
                    .wakeup
                    .wait_timeout(state, wait)
                    .map(|(guard, _)| guard)
                    .unwrap_or_else(|poisoned| poisoned.into_inner().0)
            }
            None => shared
                .wakeup
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner),
        };
    }
}
