//! Endpoint locations and polling intervals used when nothing is configured.

use std::env;

use camino::Utf8PathBuf;

#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

use crate::socket::SocketEndpoint;

/// Default TCP port for the request channel on platforms without Unix sockets.
pub const DEFAULT_REQUEST_PORT: u16 = 9780;

/// Default TCP port for the response channel on platforms without Unix sockets.
pub const DEFAULT_RESPONSE_PORT: u16 = 9781;

/// Default dispatcher poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default process poll interval in milliseconds.
pub const DEFAULT_PROCESS_POLL_INTERVAL_MS: u64 = 10;

const REQUEST_SOCKET: &str = "req.sock";
const RESPONSE_SOCKET: &str = "res.sock";

/// Computes the default request endpoint.
#[must_use]
pub fn default_request_endpoint() -> SocketEndpoint {
    default_endpoint(REQUEST_SOCKET, DEFAULT_REQUEST_PORT)
}

/// Computes the default response endpoint.
#[must_use]
pub fn default_response_endpoint() -> SocketEndpoint {
    default_endpoint(RESPONSE_SOCKET, DEFAULT_RESPONSE_PORT)
}

#[cfg(unix)]
fn default_endpoint(socket: &str, _port: u16) -> SocketEndpoint {
    SocketEndpoint::unix(default_runtime_directory().join(socket))
}

#[cfg(not(unix))]
fn default_endpoint(_socket: &str, port: u16) -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", port)
}

/// Directory holding the default sockets.
///
/// Prefers `$XDG_RUNTIME_DIR/vmslave`; otherwise falls back to a
/// uid-namespaced directory under the system temp directory.
#[must_use]
pub fn default_runtime_directory() -> Utf8PathBuf {
    #[cfg(unix)]
    {
        if let Some(mut dir) =
            runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        {
            dir.push("vmslave");
            return dir;
        }
        let mut dir = temp_base_directory();
        dir.push("vmslave");
        dir.push(user_namespace());
        dir
    }

    #[cfg(not(unix))]
    {
        let mut dir = temp_base_directory();
        dir.push("vmslave");
        dir
    }
}

fn temp_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}
