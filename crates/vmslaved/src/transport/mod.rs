//! Channel plumbing between the service and its controller.
//!
//! The controller binds two sockets: one it writes requests to and one it
//! reads responses from. The service connects to both. Frames are single
//! JSON objects terminated by a newline.
//!
//! The dispatcher only sees the [`Inbound`] and [`Outbound`] traits, so
//! tests can drive it with in-memory channels.

mod errors;
mod shared;
mod stream;

use std::time::Duration;

use vmslave_types::Envelope;

pub use self::errors::TransportError;
pub use self::shared::SharedOutbound;
pub use self::stream::{ConnectionStream, StreamInbound, StreamOutbound, TimedRead};

const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Largest inbound frame accepted before the channel is declared broken.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Outcome of a single bounded inbound poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A complete frame, without its line delimiter.
    Frame(Vec<u8>),
    /// Nothing arrived within the wait budget.
    Idle,
    /// The controller closed the channel; no further frames will arrive.
    Closed,
}

/// Source of inbound frames.
pub trait Inbound: Send {
    /// Waits at most `wait` for the next frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the channel fails irrecoverably.
    fn receive(&mut self, wait: Duration) -> Result<InboundEvent, TransportError>;
}

/// Sink for outbound envelopes.
///
/// Implementations must tolerate concurrent callers; each envelope is
/// written atomically with respect to the others.
pub trait Outbound: Send + Sync {
    /// Writes one envelope.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when encoding or writing fails.
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError>;
}
