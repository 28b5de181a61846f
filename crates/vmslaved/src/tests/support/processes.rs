//! Observing real processes started through the system runner.

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tempfile::TempDir;

use super::PATIENCE;

const SETTLE: Duration = Duration::from_millis(10);

/// Scratch file a shell script writes a process id into.
pub struct PidFile {
    _dir: TempDir,
    path: PathBuf,
}

impl PidFile {
    /// Creates a pid file path in a fresh temporary directory.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("pid file directory");
        let path = dir.path().join("process.pid");
        Self { _dir: dir, path }
    }

    /// Argument vector running `script` under `sh` with the pid file as `$1`.
    pub fn shell(&self, script: &str) -> Vec<String> {
        let path = self.path.to_str().expect("utf8 pid file path");
        ["sh", "-c", script, "sh", path]
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    /// Waits until the script has written a pid and returns it.
    pub fn read(&self) -> Pid {
        let deadline = Instant::now() + PATIENCE;
        loop {
            if let Ok(text) = fs::read_to_string(&self.path)
                && let Ok(raw) = text.trim().parse::<i32>()
            {
                return Pid::from_raw(raw);
            }
            assert!(Instant::now() < deadline, "no pid was recorded");
            thread::sleep(SETTLE);
        }
    }
}

/// True once `pid` no longer names a running process.
///
/// A killed descendant is reparented and lingers as a zombie until its new
/// parent reaps it; zombies count as terminated.
pub fn is_terminated(pid: Pid) -> bool {
    match kill(pid, None) {
        Err(Errno::ESRCH) => true,
        Ok(()) => fs::read_to_string(format!("/proc/{pid}/stat")).is_ok_and(|stat| {
            stat.rsplit_once(") ")
                .is_some_and(|(_, fields)| fields.starts_with('Z'))
        }),
        Err(_) => false,
    }
}

/// Polls [`is_terminated`] for up to [`PATIENCE`].
pub fn terminates_in_time(pid: Pid) -> bool {
    let deadline = Instant::now() + PATIENCE;
    while Instant::now() < deadline {
        if is_terminated(pid) {
            return true;
        }
        thread::sleep(SETTLE);
    }
    is_terminated(pid)
}
