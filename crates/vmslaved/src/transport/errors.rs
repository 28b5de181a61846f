//! Error types for channel connection and framing.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use vmslave_types::EnvelopeError;

/// Errors surfaced while connecting to or using a channel.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("no TCP addresses resolved for {host}:{port}")]
    ResolveEmpty { host: String, port: u16 },
    #[error("failed to connect to TCP endpoint {addr}: {source}")]
    ConnectTcp {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[cfg(unix)]
    #[error("failed to connect to unix socket {path}: {source}")]
    ConnectUnix {
        path: String,
        #[source]
        source: io::Error,
    },
    #[cfg(not(unix))]
    #[error("unix sockets are unsupported for endpoint {endpoint}")]
    UnsupportedUnix { endpoint: String },
    #[error("failed to configure channel: {source}")]
    Configure {
        #[source]
        source: io::Error,
    },
    #[error("failed to read from request channel: {source}")]
    Read {
        #[source]
        source: io::Error,
    },
    #[error("failed to write to response channel: {source}")]
    Write {
        #[source]
        source: io::Error,
    },
    #[error("inbound frame exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },
    #[error(transparent)]
    Encode(#[from] EnvelopeError),
}
