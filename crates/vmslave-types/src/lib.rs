//! Message envelopes exchanged between a controller and the `vmslaved`
//! command-execution service.
//!
//! Every frame crossing the request or response channel is a single JSON
//! object carrying a `type` discriminant. Inbound frames are decoded and
//! validated at the boundary with [`Envelope::decode`], so malformed or
//! unknown shapes surface as a typed [`EnvelopeError`] rather than as missing
//! attributes deep inside the service.
//!
//! ```
//! use vmslave_types::{Envelope, RequestId};
//!
//! let frame = br#"{"type":"command","command":["ls"],"requestID":7}"#;
//! let envelope = Envelope::decode(frame).expect("valid command frame");
//! assert_eq!(envelope.request_id(), Some(RequestId::new(7)));
//! ```

mod envelope;
mod error;
mod priority;
mod timeout;

pub use envelope::{
    CommandException, CommandRequest, CommandResult, Envelope, EnvelopeKind, LogRecord, RequestId,
    Setup,
};
pub use error::EnvelopeError;
pub use priority::{Priority, PriorityError};
