//! Test suites for the command-execution service.

pub(crate) mod support;
