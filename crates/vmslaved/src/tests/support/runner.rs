//! Scripted process runner that never touches the OS.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::runner::{ProcessHandle, ProcessOutput, ProcessRunner, RunnerError};

/// How a fake program behaves once spawned.
#[derive(Debug, Clone)]
pub enum FakeBehaviour {
    /// Exits with `exit_code` after `after` has elapsed.
    Exit {
        exit_code: i32,
        stdout: String,
        stderr: String,
        after: Duration,
    },
    /// Runs until killed.
    Hang,
    /// Fails to start.
    SpawnFailure(io::ErrorKind),
    /// Starts, but fails when waited on.
    WaitFailure,
}

impl FakeBehaviour {
    /// Exits immediately with the given code and stdout.
    pub fn exit(exit_code: i32, stdout: &str) -> Self {
        Self::Exit {
            exit_code,
            stdout: stdout.to_owned(),
            stderr: String::new(),
            after: Duration::ZERO,
        }
    }

    /// Exits successfully after `after`.
    pub fn slow(after: Duration) -> Self {
        Self::Exit {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            after,
        }
    }
}

#[derive(Default)]
struct Ledger {
    spawned: Vec<Vec<String>>,
    live: usize,
    max_live: usize,
    killed: usize,
}

/// Runner whose programs are looked up by `argv[0]`.
///
/// Unknown programs exit immediately with status 0.
#[derive(Clone, Default)]
pub struct FakeRunner {
    programs: Arc<Mutex<HashMap<String, FakeBehaviour>>>,
    ledger: Arc<Mutex<Ledger>>,
}

impl FakeRunner {
    /// Creates a runner with no scripted programs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the behaviour of `program`.
    pub fn with(self, program: &str, behaviour: FakeBehaviour) -> Self {
        self.script(program, behaviour);
        self
    }

    /// Scripts the behaviour of `program` in place.
    pub fn script(&self, program: &str, behaviour: FakeBehaviour) {
        self.programs
            .lock()
            .expect("programs mutex poisoned")
            .insert(program.to_owned(), behaviour);
    }

    /// Argument vectors spawned so far.
    pub fn spawned(&self) -> Vec<Vec<String>> {
        self.ledger().spawned.clone()
    }

    /// Processes spawned but neither exited nor killed.
    pub fn live(&self) -> usize {
        self.ledger().live
    }

    /// Highest number of simultaneously live processes.
    pub fn max_live(&self) -> usize {
        self.ledger().max_live
    }

    /// Number of processes killed.
    pub fn killed(&self) -> usize {
        self.ledger().killed
    }

    fn ledger(&self) -> std::sync::MutexGuard<'_, Ledger> {
        self.ledger.lock().expect("ledger mutex poisoned")
    }

    fn behaviour_for(&self, program: &str) -> FakeBehaviour {
        self.programs
            .lock()
            .expect("programs mutex poisoned")
            .get(program)
            .cloned()
            .unwrap_or_else(|| FakeBehaviour::exit(0, ""))
    }
}

impl ProcessRunner for FakeRunner {
    fn spawn(&self, command: &[String]) -> Result<Box<dyn ProcessHandle>, RunnerError> {
        let program = command.first().ok_or(RunnerError::EmptyCommand)?;
        let behaviour = self.behaviour_for(program);
        if let FakeBehaviour::SpawnFailure(kind) = behaviour {
            return Err(RunnerError::spawn(program.as_str(), io::Error::from(kind)));
        }
        {
            let mut ledger = self.ledger();
            ledger.spawned.push(command.to_vec());
            ledger.live += 1;
            ledger.max_live = ledger.max_live.max(ledger.live);
        }
        Ok(Box::new(FakeHandle {
            program: program.clone(),
            behaviour,
            started: Instant::now(),
            ledger: Arc::clone(&self.ledger),
            running: true,
        }))
    }
}

struct FakeHandle {
    program: String,
    behaviour: FakeBehaviour,
    started: Instant,
    ledger: Arc<Mutex<Ledger>>,
    running: bool,
}

impl FakeHandle {
    fn stop(&mut self, killed: bool) {
        if !self.running {
            return;
        }
        self.running = false;
        let mut ledger = self.ledger.lock().expect("ledger mutex poisoned");
        ledger.live -= 1;
        if killed {
            ledger.killed += 1;
        }
    }
}

impl ProcessHandle for FakeHandle {
    fn id(&self) -> Option<u32> {
        None
    }

    fn wait_timeout(&mut self, wait: Duration) -> Result<Option<ProcessOutput>, RunnerError> {
        match &self.behaviour {
            FakeBehaviour::Exit {
                exit_code,
                stdout,
                stderr,
                after,
            } => {
                let remaining = after.saturating_sub(self.started.elapsed());
                if remaining > wait {
                    thread::sleep(wait);
                    return Ok(None);
                }
                thread::sleep(remaining);
                let output = ProcessOutput {
                    stdout: stdout.clone().into_bytes(),
                    stderr: stderr.clone().into_bytes(),
                    exit_code: *exit_code,
                };
                self.stop(false);
                Ok(Some(output))
            }
            FakeBehaviour::Hang => {
                thread::sleep(wait);
                Ok(None)
            }
            FakeBehaviour::WaitFailure | FakeBehaviour::SpawnFailure(_) => {
                Err(RunnerError::Wait {
                    program: self.program.clone(),
                    source: io::Error::other("scripted wait failure"),
                })
            }
        }
    }

    fn kill(&mut self) -> Result<(), RunnerError> {
        self.stop(true);
        Ok(())
    }
}
