//! Socket-backed channel implementations.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;

use vmslave_config::SocketEndpoint;
use vmslave_types::Envelope;

use super::{
    Inbound, InboundEvent, MAX_FRAME_BYTES, Outbound, TRANSPORT_TARGET, TransportError,
};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

const READ_CHUNK_BYTES: usize = 4096;
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Stream types the service can connect over.
#[derive(Debug)]
pub enum ConnectionStream {
    /// TCP connection.
    Tcp(TcpStream),
    /// Unix domain socket connection.
    #[cfg(unix)]
    Unix(UnixStream),
}

impl ConnectionStream {
    /// Connects to the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the address cannot be resolved or the
    /// connection is refused.
    pub fn connect(endpoint: &SocketEndpoint) -> Result<Self, TransportError> {
        let stream = match endpoint {
            SocketEndpoint::Tcp { host, port } => Self::Tcp(connect_tcp(host, *port)?),
            SocketEndpoint::Unix { path } => {
                #[cfg(unix)]
                {
                    let stream = UnixStream::connect(path.as_std_path()).map_err(|source| {
                        TransportError::ConnectUnix {
                            path: path.to_string(),
                            source,
                        }
                    })?;
                    Self::Unix(stream)
                }

                #[cfg(not(unix))]
                {
                    let _ = path;
                    return Err(TransportError::UnsupportedUnix {
                        endpoint: endpoint.to_string(),
                    });
                }
            }
        };
        debug!(
            target: TRANSPORT_TARGET,
            endpoint = %endpoint,
            "connected to controller endpoint"
        );
        Ok(stream)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.set_read_timeout(timeout),
            #[cfg(unix)]
            Self::Unix(stream) => stream.set_read_timeout(timeout),
        }
    }
}

impl Read for ConnectionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ConnectionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

fn connect_tcp(host: &str, port: u16) -> Result<TcpStream, TransportError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let addr = addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| TransportError::ResolveEmpty {
            host: host.to_owned(),
            port,
        })?;
    TcpStream::connect(addr).map_err(|source| TransportError::ConnectTcp { addr, source })
}

/// Reads newline-delimited frames from the request channel.
///
/// Partial lines are buffered across polls, and blank lines are skipped.
#[derive(Debug)]
pub struct StreamInbound<S = ConnectionStream> {
    stream: S,
    buffer: Vec<u8>,
    read_timeout: Option<Duration>,
    closed: bool,
}

impl StreamInbound {
    /// Connects to the request endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the connection cannot be established.
    pub fn connect(endpoint: &SocketEndpoint) -> Result<Self, TransportError> {
        ConnectionStream::connect(endpoint).map(Self::new)
    }
}

impl<S> StreamInbound<S> {
    /// Wraps an already-connected stream.
    pub const fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
            read_timeout: None,
            closed: false,
        }
    }

    fn take_buffered_frame(&mut self) -> Option<Vec<u8>> {
        while let Some(position) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=position).collect();
            line.pop();
            if !line.trim_ascii().is_empty() {
                return Some(line);
            }
        }
        None
    }

    fn take_trailing_frame(&mut self) -> Option<Vec<u8>> {
        let rest = std::mem::take(&mut self.buffer);
        (!rest.trim_ascii().is_empty()).then_some(rest)
    }

    fn absorb(&mut self, chunk: &[u8]) -> Result<(), TransportError> {
        self.buffer.extend_from_slice(chunk);
        let pending = self
            .buffer
            .iter()
            .rposition(|byte| *byte == b'\n')
            .map_or(self.buffer.len(), |position| {
                self.buffer.len() - position - 1
            });
        if pending > MAX_FRAME_BYTES {
            return Err(TransportError::FrameTooLarge {
                limit: MAX_FRAME_BYTES,
            });
        }
        Ok(())
    }
}

/// Streams whose blocking reads can be bounded.
pub trait TimedRead: Read + Send {
    /// Applies a read timeout to subsequent reads.
    ///
    /// # Errors
    ///
    /// Propagates the OS error when the timeout cannot be set.
    fn apply_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl TimedRead for ConnectionStream {
    fn apply_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))
    }
}

impl<S: TimedRead> Inbound for StreamInbound<S> {
    fn receive(&mut self, wait: Duration) -> Result<InboundEvent, TransportError> {
        if let Some(frame) = self.take_buffered_frame() {
            return Ok(InboundEvent::Frame(frame));
        }
        if self.closed {
            return Ok(InboundEvent::Closed);
        }

        let wait = wait.max(MIN_READ_TIMEOUT);
        if self.read_timeout != Some(wait) {
            self.stream
                .apply_read_timeout(wait)
                .map_err(|source| TransportError::Configure { source })?;
            self.read_timeout = Some(wait);
        }

        let mut chunk = [0_u8; READ_CHUNK_BYTES];
        match self.stream.read(&mut chunk) {
            Ok(0) => {
                self.closed = true;
                Ok(self
                    .take_trailing_frame()
                    .map_or(InboundEvent::Closed, InboundEvent::Frame))
            }
            Ok(read) => {
                self.absorb(chunk.get(..read).unwrap_or_default())?;
                Ok(self
                    .take_buffered_frame()
                    .map_or(InboundEvent::Idle, InboundEvent::Frame))
            }
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(InboundEvent::Idle)
            }
            Err(source) => Err(TransportError::Read { source }),
        }
    }
}

/// Writes newline-delimited envelopes to the response channel.
#[derive(Debug)]
pub struct StreamOutbound<W = ConnectionStream> {
    writer: Mutex<W>,
}

impl StreamOutbound {
    /// Connects to the response endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the connection cannot be established.
    pub fn connect(endpoint: &SocketEndpoint) -> Result<Self, TransportError> {
        ConnectionStream::connect(endpoint).map(Self::new)
    }
}

impl<W> StreamOutbound<W> {
    /// Wraps an already-connected writer.
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> Outbound for StreamOutbound<W> {
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let line = envelope.encode()?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer
            .write_all(&line)
            .and_then(|()| writer.flush())
            .map_err(|source| TransportError::Write { source })
    }
}
