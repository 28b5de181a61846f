//! `mockall` doubles for the service's collaborator traits.

use mockall::mock;

use vmslave_types::Priority;

use crate::forwarder::LogSink;
use crate::runner::{ProcessHandle, ProcessRunner, RunnerError};

mock! {
    pub LogSink {}
    impl LogSink for LogSink {
        fn forward(&self, priority: Priority, message: &str);
    }
}

mock! {
    pub Runner {}
    impl ProcessRunner for Runner {
        fn spawn(&self, command: &[String]) -> Result<Box<dyn ProcessHandle>, RunnerError>;
    }
}
