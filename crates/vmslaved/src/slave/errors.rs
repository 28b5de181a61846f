//! Errors that end the dispatcher loop abnormally.

use thiserror::Error;

use crate::transport::TransportError;

/// Failures returned from [`Slave::serve_till_shutdown`](super::Slave::serve_till_shutdown).
///
/// Protocol violations and per-request failures never appear here; they are
/// forwarded to the controller and the loop carries on.
#[derive(Debug, Error)]
pub enum SlaveError {
    /// The request channel failed.
    #[error("request channel failed: {source}")]
    Inbound {
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },
    /// The response channel failed.
    #[error("response channel failed: {source}")]
    Outbound {
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },
    /// Another thread is already serving this slave.
    #[error("slave is already being served")]
    AlreadyServing,
}
