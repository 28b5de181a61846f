use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Address of one of the two channels the service connects to.
///
/// The controller owns both sockets; the service only dials them.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum SocketEndpoint {
    /// Unix domain socket endpoint.
    Unix { path: Utf8PathBuf },
    /// TCP socket endpoint.
    Tcp { host: String, port: u16 },
}

impl SocketEndpoint {
    /// Endpoint dialled through a Unix domain socket at `path`.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Endpoint dialled over TCP.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Returns the Unix socket path when the endpoint uses the Unix transport.
    #[must_use]
    pub fn unix_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Unix { path } => Some(path.as_ref()),
            Self::Tcp { .. } => None,
        }
    }

    /// Returns the host and port when the endpoint uses TCP.
    #[must_use]
    pub fn tcp_address(&self) -> Option<(&str, u16)> {
        match self {
            Self::Tcp { host, port } => Some((host.as_str(), *port)),
            Self::Unix { .. } => None,
        }
    }

    /// Checks that a Unix socket endpoint names an existing socket file.
    ///
    /// TCP endpoints always pass; reachability is only known on connect.
    pub fn ensure_present(&self) -> Result<(), SocketPreparationError> {
        let Some(path) = self.unix_path() else {
            return Ok(());
        };
        if path.as_std_path().exists() {
            Ok(())
        } else {
            Err(SocketPreparationError::MissingSocket {
                path: path.to_path_buf(),
            })
        }
    }
}

impl fmt::Display for SocketEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { path } => write!(formatter, "unix://{path}"),
            Self::Tcp { host, port } => write!(formatter, "tcp://{host}:{port}"),
        }
    }
}

impl FromStr for SocketEndpoint {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input)?;
        match url.scheme() {
            // `ipc://` is the controller's own spelling of a Unix socket.
            "unix" | "ipc" => unix_endpoint(&url, input),
            "tcp" => tcp_endpoint(&url, input),
            other => Err(SocketParseError::UnsupportedScheme(other.to_owned())),
        }
    }
}

fn unix_endpoint(url: &Url, input: &str) -> Result<SocketEndpoint, SocketParseError> {
    match url.path() {
        "" | "/" => Err(SocketParseError::MissingUnixPath(input.to_owned())),
        path => Ok(SocketEndpoint::unix(path)),
    }
}

fn tcp_endpoint(url: &Url, input: &str) -> Result<SocketEndpoint, SocketParseError> {
    let host = url
        .host_str()
        .ok_or_else(|| SocketParseError::MissingHost(input.to_owned()))?;
    let port = url
        .port()
        .ok_or_else(|| SocketParseError::MissingPort(input.to_owned()))?;
    Ok(SocketEndpoint::tcp(host, port))
}

/// Errors encountered while parsing a [`SocketEndpoint`] from text.
#[derive(Debug, Error)]
pub enum SocketParseError {
    /// Only `unix`, `ipc` and `tcp` endpoints can be dialled.
    #[error("unsupported socket scheme '{0}'")]
    UnsupportedScheme(String),
    /// A `tcp://` endpoint without a host.
    #[error("missing TCP host in '{0}'")]
    MissingHost(String),
    /// A `tcp://` endpoint without a port; there is no default.
    #[error("missing TCP port in '{0}'")]
    MissingPort(String),
    /// A Unix endpoint naming no socket file.
    #[error("missing Unix socket path in '{0}'")]
    MissingUnixPath(String),
    /// The text is not a URL at all.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Errors raised when a configured endpoint cannot be used.
#[derive(Debug, Error)]
pub enum SocketPreparationError {
    /// No socket file exists at the configured Unix path.
    #[error("no socket is listening at '{path}'")]
    MissingSocket { path: Utf8PathBuf },
}
