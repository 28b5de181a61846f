//! Controller side of the request and response sockets.

use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use tempfile::TempDir;

use vmslave_config::SocketEndpoint;
use vmslave_types::Envelope;

const READ_SLICE: Duration = Duration::from_millis(25);

/// Binds both sockets in a private directory and speaks to one slave.
pub struct Controller {
    dir: TempDir,
    request_listener: UnixListener,
    response_listener: UnixListener,
    request: Option<UnixStream>,
    responses: Option<BufReader<UnixStream>>,
    pending: Vec<u8>,
    received: Vec<Envelope>,
}

impl Controller {
    /// Binds `req.sock` and `res.sock` in a fresh temporary directory.
    pub fn bind() -> Self {
        let dir = TempDir::new().expect("create socket directory");
        let request_listener =
            UnixListener::bind(dir.path().join("req.sock")).expect("bind request socket");
        let response_listener =
            UnixListener::bind(dir.path().join("res.sock")).expect("bind response socket");
        Self {
            dir,
            request_listener,
            response_listener,
            request: None,
            responses: None,
            pending: Vec::new(),
            received: Vec::new(),
        }
    }

    /// Directory holding both sockets.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Endpoint the slave reads requests from.
    pub fn request_endpoint(&self) -> SocketEndpoint {
        SocketEndpoint::unix(self.socket_path("req.sock"))
    }

    /// Endpoint the slave writes responses to.
    pub fn response_endpoint(&self) -> SocketEndpoint {
        SocketEndpoint::unix(self.socket_path("res.sock"))
    }

    fn socket_path(&self, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().join(name)).expect("utf8 socket path")
    }

    /// Accepts the slave's two connections.
    pub fn accept(&mut self, patience: Duration) -> Result<(), String> {
        let request = accept_within(&self.request_listener, patience)?;
        let responses = accept_within(&self.response_listener, patience)?;
        responses
            .set_read_timeout(Some(READ_SLICE))
            .map_err(|error| error.to_string())?;
        self.request = Some(request);
        self.responses = Some(BufReader::new(responses));
        Ok(())
    }

    /// Writes one envelope as a JSON line.
    pub fn send(&mut self, envelope: &Envelope) -> Result<(), String> {
        let line = envelope.encode().map_err(|error| error.to_string())?;
        self.send_raw(&line)
    }

    /// Writes raw bytes to the request socket.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<(), String> {
        let stream = self
            .request
            .as_mut()
            .ok_or_else(|| String::from("request socket is not connected"))?;
        stream
            .write_all(bytes)
            .and_then(|()| stream.flush())
            .map_err(|error| error.to_string())
    }

    /// Closes the request socket, signalling end of stream.
    pub fn close_requests(&mut self) {
        self.request.take();
    }

    /// Reads responses until `matches` accepts one or `patience` runs out.
    pub fn wait_for(
        &mut self,
        patience: Duration,
        matches: impl Fn(&Envelope) -> bool,
    ) -> Option<Envelope> {
        if let Some(found) = self.received.iter().find(|envelope| matches(envelope)) {
            return Some(found.clone());
        }
        let deadline = Instant::now() + patience;
        while Instant::now() < deadline {
            let Some(envelope) = self.read_one() else {
                continue;
            };
            self.received.push(envelope.clone());
            if matches(&envelope) {
                return Some(envelope);
            }
        }
        None
    }

    /// Everything read from the response socket so far.
    pub fn received(&self) -> &[Envelope] {
        &self.received
    }

    fn read_one(&mut self) -> Option<Envelope> {
        let Some(responses) = self.responses.as_mut() else {
            thread::sleep(READ_SLICE);
            return None;
        };
        match responses.read_until(b'\n', &mut self.pending) {
            Ok(0) => {
                thread::sleep(READ_SLICE);
                None
            }
            Ok(_) if self.pending.ends_with(b"\n") => {
                let line = std::mem::take(&mut self.pending);
                Some(Envelope::decode(&line).expect("slave sent a well-formed envelope"))
            }
            Ok(_) => None,
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                None
            }
            Err(error) => panic!("response socket failed: {error}"),
        }
    }
}

fn accept_within(listener: &UnixListener, patience: Duration) -> Result<UnixStream, String> {
    listener
        .set_nonblocking(true)
        .map_err(|error| error.to_string())?;
    let deadline = Instant::now() + patience;
    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                stream
                    .set_nonblocking(false)
                    .map_err(|error| error.to_string())?;
                return Ok(stream);
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(String::from("slave never connected"));
                }
                thread::sleep(READ_SLICE);
            }
            Err(error) => return Err(error.to_string()),
        }
    }
}
