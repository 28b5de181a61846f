//! In-memory request and response channels.

use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use vmslave_types::Envelope;

use crate::transport::{Inbound, InboundEvent, Outbound, SharedOutbound, TransportError};

enum Scripted {
    Frame(Vec<u8>),
    Fail(io::ErrorKind),
}

/// Request channel fed from the test thread.
pub struct MemoryInbound {
    frames: Receiver<Scripted>,
}

/// Controller side of a [`MemoryInbound`].
#[derive(Clone)]
pub struct InboundSender {
    frames: Sender<Scripted>,
}

impl MemoryInbound {
    /// Creates a connected channel pair.
    pub fn channel() -> (Self, InboundSender) {
        let (sender, receiver) = mpsc::channel();
        (Self { frames: receiver }, InboundSender { frames: sender })
    }
}

impl Inbound for MemoryInbound {
    fn receive(&mut self, wait: Duration) -> Result<InboundEvent, TransportError> {
        match self.frames.recv_timeout(wait) {
            Ok(Scripted::Frame(frame)) => Ok(InboundEvent::Frame(frame)),
            Ok(Scripted::Fail(kind)) => Err(TransportError::Read {
                source: io::Error::from(kind),
            }),
            Err(RecvTimeoutError::Timeout) => Ok(InboundEvent::Idle),
            Err(RecvTimeoutError::Disconnected) => Ok(InboundEvent::Closed),
        }
    }
}

impl InboundSender {
    /// Queues a raw frame.
    pub fn send_raw(&self, frame: &str) {
        self.frames
            .send(Scripted::Frame(frame.as_bytes().to_vec()))
            .expect("inbound receiver dropped");
    }

    /// Queues an encoded envelope.
    pub fn send(&self, envelope: &Envelope) {
        let mut line = envelope.encode().expect("encode envelope");
        line.pop();
        self.frames
            .send(Scripted::Frame(line))
            .expect("inbound receiver dropped");
    }

    /// Makes the next receive fail with `kind`.
    pub fn fail(&self, kind: io::ErrorKind) {
        self.frames
            .send(Scripted::Fail(kind))
            .expect("inbound receiver dropped");
    }
}

#[derive(Default)]
struct Recorded {
    envelopes: Mutex<Vec<Envelope>>,
    arrived: Condvar,
    fail_writes: Mutex<bool>,
}

/// Response channel that records every envelope.
#[derive(Clone, Default)]
pub struct MemoryOutbound {
    recorded: Arc<Recorded>,
}

impl MemoryOutbound {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the recorder in the service's shared outbound path.
    pub fn shared(&self) -> SharedOutbound {
        SharedOutbound::new(self.clone())
    }

    /// Makes every subsequent write fail.
    pub fn break_channel(&self) {
        *self.recorded.fail_writes.lock().expect("flag mutex poisoned") = true;
    }

    /// Snapshot of everything sent so far.
    pub fn envelopes(&self) -> Vec<Envelope> {
        self.recorded
            .envelopes
            .lock()
            .expect("recorder mutex poisoned")
            .clone()
    }

    /// Waits until `ready` holds for the recorded envelopes.
    pub fn wait_until(&self, timeout: Duration, ready: impl Fn(&[Envelope]) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut envelopes = self
            .recorded
            .envelopes
            .lock()
            .expect("recorder mutex poisoned");
        loop {
            if ready(&envelopes) {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            envelopes = self
                .recorded
                .arrived
                .wait_timeout(envelopes, remaining)
                .expect("recorder mutex poisoned")
                .0;
        }
    }

    /// Waits until `count` terminal envelopes have been sent.
    pub fn wait_for_terminals(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |envelopes| {
            envelopes.iter().filter(|envelope| envelope.is_terminal()).count() >= count
        })
    }

    /// Terminal envelopes only, in send order.
    pub fn terminals(&self) -> Vec<Envelope> {
        self.envelopes()
            .into_iter()
            .filter(Envelope::is_terminal)
            .collect()
    }
}

impl Outbound for MemoryOutbound {
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        if *self.recorded.fail_writes.lock().expect("flag mutex poisoned") {
            return Err(TransportError::Write {
                source: io::Error::from(io::ErrorKind::BrokenPipe),
            });
        }
        self.recorded
            .envelopes
            .lock()
            .expect("recorder mutex poisoned")
            .push(envelope.clone());
        self.recorded.arrived.notify_all();
        Ok(())
    }
}
