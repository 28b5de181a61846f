//! Configuration loaders pointing the service at test-owned sockets.

use std::ffi::OsString;
use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};

use vmslave_config::{Config, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Loader that targets sockets under a caller-provided directory.
pub struct TestConfigLoader {
    request: SocketEndpoint,
    response: SocketEndpoint,
}

impl TestConfigLoader {
    /// Points both endpoints at `req.sock` and `res.sock` under `dir`.
    #[must_use]
    pub fn in_dir(dir: &std::path::Path) -> Self {
        let dir = Utf8PathBuf::from_path_buf(dir.to_path_buf()).expect("utf8 temp dir");
        Self {
            request: SocketEndpoint::unix(dir.join("req.sock")),
            response: SocketEndpoint::unix(dir.join("res.sock")),
        }
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            request_endpoint: self.request.clone(),
            response_endpoint: self.response.clone(),
            poll_interval_ms: 20,
            ..Config::default()
        })
    }
}

/// Loader fed a request endpoint with a scheme the service cannot dial.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter(
            ["vmslaved", "--request-endpoint", "udp://127.0.0.1:9780"].map(OsString::from),
        )
    }
}
