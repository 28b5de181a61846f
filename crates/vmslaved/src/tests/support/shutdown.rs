//! Shutdown signal fired by the test thread.

use std::sync::{Arc, Condvar, Mutex};

use crate::process::{ShutdownError, ShutdownSignal};

#[derive(Clone, Default)]
pub struct ManualShutdownSignal {
    inner: Arc<(Mutex<Option<bool>>, Condvar)>,
}

impl ManualShutdownSignal {
    pub fn trigger(&self) {
        self.settle(true);
    }

    fn settle(&self, requested: bool) {
        let (lock, cvar) = &*self.inner;
        let mut outcome = lock.lock().expect("shutdown mutex poisoned");
        outcome.get_or_insert(requested);
        cvar.notify_all();
    }
}

impl ShutdownSignal for ManualShutdownSignal {
    fn wait(&self) -> Result<bool, ShutdownError> {
        let (lock, cvar) = &*self.inner;
        let mut outcome = lock.lock().expect("shutdown mutex poisoned");
        loop {
            if let Some(requested) = *outcome {
                return Ok(requested);
            }
            outcome = cvar.wait(outcome).expect("shutdown mutex poisoned during wait");
        }
    }

    fn close(&self) {
        self.settle(false);
    }
}
