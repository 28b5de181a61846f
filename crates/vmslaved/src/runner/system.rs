//! Runner backed by `std::process`.

use std::io::{self, Read};
use std::mem;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::os::unix::process::CommandExt;

use tracing::debug;

use super::{ProcessHandle, ProcessOutput, ProcessRunner, RunnerError};

const RUNNER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runner");

/// Spawns real OS processes with captured stdout and stderr.
///
/// Standard input is closed. Each captured stream is drained on its own
/// thread so a chatty child never blocks on a full pipe. On Unix every
/// process leads a fresh process group, and killing it signals the whole
/// group so forked descendants go with it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessRunner;

impl SystemProcessRunner {
    /// Builds a new runner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ProcessRunner for SystemProcessRunner {
    fn spawn(&self, command: &[String]) -> Result<Box<dyn ProcessHandle>, RunnerError> {
        let (program, args) = command.split_first().ok_or(RunnerError::EmptyCommand)?;
        let mut builder = Command::new(program);
        builder
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        builder.process_group(0);
        let mut child = builder
            .spawn()
            .map_err(|source| RunnerError::spawn(program.as_str(), source))?;

        let (sender, captured) = mpsc::channel();
        let mut outstanding = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            drain(Stream::Stdout, stdout, sender.clone());
            outstanding.push(Stream::Stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            drain(Stream::Stderr, stderr, sender);
            outstanding.push(Stream::Stderr);
        }
        debug!(
            target: RUNNER_TARGET,
            program = %program,
            pid = child.id(),
            "spawned process"
        );
        Ok(Box::new(SystemProcessHandle {
            program: program.clone(),
            child,
            exited: None,
            captured,
            outstanding,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    const fn name(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

type Captured = (Stream, io::Result<Vec<u8>>);

fn drain(stream: Stream, mut source: impl Read + Send + 'static, sender: Sender<Captured>) {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let result = source.read_to_end(&mut buffer).map(|_| buffer);
        // Nobody listens once the handle has been killed or dropped.
        drop(sender.send((stream, result)));
    });
}

struct SystemProcessHandle {
    program: String,
    child: Child,
    exited: Option<ExitStatus>,
    captured: Receiver<Captured>,
    outstanding: Vec<Stream>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl SystemProcessHandle {
    fn try_wait(&mut self) -> Result<Option<ExitStatus>, RunnerError> {
        self.child.try_wait().map_err(|source| RunnerError::Wait {
            program: self.program.clone(),
            source,
        })
    }

    fn exit_status(&mut self, wait: Duration) -> Result<Option<ExitStatus>, RunnerError> {
        if self.exited.is_none() {
            self.exited = self.try_wait()?;
        }
        if self.exited.is_none() {
            thread::sleep(wait);
            self.exited = self.try_wait()?;
        }
        Ok(self.exited)
    }

    /// Receives captured streams until both have closed or `deadline` passes.
    ///
    /// Descendants that inherited the pipes keep them open after the direct
    /// child has exited, so this never blocks past `deadline`.
    fn collect_until(&mut self, deadline: Instant) -> Result<bool, RunnerError> {
        while let Some(&waiting_on) = self.outstanding.first() {
            let received = match self.captured.try_recv() {
                Ok(captured) => Ok(captured),
                Err(TryRecvError::Empty) => self
                    .captured
                    .recv_timeout(deadline.saturating_duration_since(Instant::now())),
                Err(TryRecvError::Disconnected) => Err(RecvTimeoutError::Disconnected),
            };
            match received {
                Ok((stream, result)) => self.store(stream, result)?,
                Err(RecvTimeoutError::Timeout) => return Ok(false),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(RunnerError::ReaderPanicked {
                        program: self.program.clone(),
                        stream: waiting_on.name(),
                    });
                }
            }
        }
        Ok(true)
    }

    fn store(&mut self, stream: Stream, result: io::Result<Vec<u8>>) -> Result<(), RunnerError> {
        self.outstanding.retain(|pending| *pending != stream);
        let bytes = result.map_err(|source| RunnerError::Capture {
            program: self.program.clone(),
            stream: stream.name(),
            source,
        })?;
        match stream {
            Stream::Stdout => self.stdout = bytes,
            Stream::Stderr => self.stderr = bytes,
        }
        Ok(())
    }

    #[cfg(unix)]
    fn signal_group(&self) -> Result<(), RunnerError> {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let kill_error = |source: io::Error| RunnerError::Kill {
            program: self.program.clone(),
            source,
        };
        let leader = i32::try_from(self.child.id())
            .map_err(|_| kill_error(io::Error::from(io::ErrorKind::InvalidInput)))?;
        match killpg(Pid::from_raw(leader), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(kill_error(io::Error::from(errno))),
        }
    }

    #[cfg(not(unix))]
    fn signal_group(&mut self) -> Result<(), RunnerError> {
        if self.exited.is_some() {
            return Ok(());
        }
        match self.child.kill() {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(source) => Err(RunnerError::Kill {
                program: self.program.clone(),
                source,
            }),
        }
    }
}

impl ProcessHandle for SystemProcessHandle {
    fn id(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn wait_timeout(&mut self, wait: Duration) -> Result<Option<ProcessOutput>, RunnerError> {
        let deadline = Instant::now() + wait;
        let Some(status) = self.exit_status(wait)? else {
            return Ok(None);
        };
        if !self.collect_until(deadline)? {
            return Ok(None);
        }
        Ok(Some(ProcessOutput {
            stdout: mem::take(&mut self.stdout),
            stderr: mem::take(&mut self.stderr),
            exit_code: exit_code(status),
        }))
    }

    fn kill(&mut self) -> Result<(), RunnerError> {
        self.signal_group()?;
        if self.exited.is_none() {
            let status = self.child.wait().map_err(|source| RunnerError::Wait {
                program: self.program.clone(),
                source,
            })?;
            self.exited = Some(status);
        }
        // The readers see end of stream once the group is gone.
        self.outstanding.clear();
        debug!(
            target: RUNNER_TARGET,
            program = %self.program,
            pid = self.child.id(),
            "killed process group"
        );
        Ok(())
    }
}

impl Drop for SystemProcessHandle {
    fn drop(&mut self) {
        if self.exited.is_none() || !self.outstanding.is_empty() {
            drop(self.kill());
        }
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| -signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(all(test, unix))]
mod tests {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    use rstest::rstest;

    use super::*;
    use crate::tests::support::{PidFile, terminates_in_time};

    const POLL: Duration = Duration::from_millis(10);

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| (*part).to_owned()).collect()
    }

    fn wait_for_output(handle: &mut dyn ProcessHandle) -> ProcessOutput {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(output) = handle.wait_timeout(POLL).expect("wait succeeds") {
                return output;
            }
            assert!(Instant::now() < deadline, "process did not finish in time");
        }
    }

    #[test]
    fn captures_output_and_exit_code() {
        let mut handle = SystemProcessRunner
            .spawn(&argv(&["sh", "-c", "printf out; printf err >&2; exit 3"]))
            .expect("spawn sh");
        let output = wait_for_output(handle.as_mut());
        assert_eq!(output.stdout, b"out");
        assert_eq!(output.stderr, b"err");
        assert_eq!(output.exit_code, 3);
    }

    #[rstest]
    #[case(&["definitely-not-a-real-program-vmslave"])]
    #[case(&["/nonexistent/vmslave/bin"])]
    fn spawn_failures_name_the_program(#[case] command: &[&str]) {
        let error = SystemProcessRunner
            .spawn(&argv(command))
            .err()
            .expect("spawn must fail");
        let message = error.to_string();
        assert!(
            message.starts_with(&format!("failed to spawn '{}': ", command[0])),
            "unexpected message: {message}"
        );
    }

    #[test]
    fn empty_commands_are_rejected() {
        assert!(matches!(
            SystemProcessRunner.spawn(&[]),
            Err(RunnerError::EmptyCommand)
        ));
    }

    #[test]
    fn kill_terminates_and_reaps_the_process() {
        let mut handle = SystemProcessRunner
            .spawn(&argv(&["sleep", "5"]))
            .expect("spawn sleep");
        let pid = handle.id().expect("pid");
        assert!(handle.wait_timeout(POLL).expect("wait").is_none());

        handle.kill().expect("kill sleep");

        let raw = i32::try_from(pid).expect("pid fits in i32");
        assert_eq!(kill(Pid::from_raw(raw), None), Err(Errno::ESRCH));
    }

    #[test]
    fn signalled_processes_report_negated_signal() {
        let mut handle = SystemProcessRunner
            .spawn(&argv(&["sh", "-c", "kill -9 $$"]))
            .expect("spawn sh");
        let output = wait_for_output(handle.as_mut());
        assert_eq!(output.exit_code, -9);
    }

    #[test]
    fn a_descendant_holding_the_pipes_does_not_block_the_wait() {
        let pid_file = PidFile::new();
        let mut handle = SystemProcessRunner
            .spawn(&pid_file.shell("sleep 30 & echo $! > \"$1\""))
            .expect("spawn sh");
        let descendant = pid_file.read();

        let started = Instant::now();
        for _ in 0..5 {
            assert!(
                handle.wait_timeout(POLL).expect("wait").is_none(),
                "output is still held open"
            );
        }
        assert!(started.elapsed() < Duration::from_secs(1));

        handle.kill().expect("kill process group");
        assert!(terminates_in_time(descendant), "descendant survived the kill");
    }

    #[test]
    fn output_is_complete_once_descendants_release_the_pipes() {
        let mut handle = SystemProcessRunner
            .spawn(&argv(&["sh", "-c", "(sleep 0.2; printf late) & printf early"]))
            .expect("spawn sh");
        let output = wait_for_output(handle.as_mut());
        assert_eq!(output.stdout, b"earlylate");
        assert_eq!(output.exit_code, 0);
    }

    #[test]
    fn dropping_a_running_handle_kills_its_group() {
        let pid_file = PidFile::new();
        let handle = SystemProcessRunner
            .spawn(&pid_file.shell("sleep 30 & echo $! > \"$1\"; wait"))
            .expect("spawn sh");
        let descendant = pid_file.read();

        drop(handle);

        assert!(terminates_in_time(descendant), "descendant outlived its handle");
    }
}
