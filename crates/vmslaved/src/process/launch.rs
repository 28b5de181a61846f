//! Supervises service launch sequencing and runtime orchestration.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use crate::bootstrap::{ConfigLoader, SystemConfigLoader};
use crate::health::{LifecycleReporter, StructuredLifecycleReporter};
use crate::slave::{Slave, SlaveSettings};
use crate::telemetry;
use crate::transport::{StreamInbound, StreamOutbound};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

const WATCHER_THREAD: &str = "shutdown watcher";

/// Collaborators required to launch the service.
pub(crate) struct LaunchPlan<L, S> {
    pub(crate) loader: L,
    pub(crate) shutdown: S,
    pub(crate) reporter: Arc<dyn LifecycleReporter>,
}

/// Runs the service using the production collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when configuration, telemetry, the signal
/// listener or either connection cannot be set up, or when the dispatch loop
/// fails.
pub fn run_slave() -> Result<(), LaunchError> {
    let shutdown = SystemShutdownSignal::install()?;
    run_slave_with(LaunchPlan {
        loader: SystemConfigLoader,
        shutdown,
        reporter: Arc::new(StructuredLifecycleReporter::new()),
    })
}

/// Runs the service with injected collaborators.
pub(crate) fn run_slave_with<L, S>(plan: LaunchPlan<L, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal + 'static,
{
    let LaunchPlan {
        loader,
        shutdown,
        reporter,
    } = plan;

    let config = loader.load()?;
    telemetry::initialise(&config)?;
    info!(
        target: PROCESS_TARGET,
        request = %config.request_endpoint(),
        response = %config.response_endpoint(),
        "starting command-execution service"
    );

    config.request_endpoint().ensure_present()?;
    config.response_endpoint().ensure_present()?;
    let inbound =
        StreamInbound::connect(config.request_endpoint()).map_err(|source| LaunchError::Connect {
            channel: "request",
            source,
        })?;
    let outbound = StreamOutbound::connect(config.response_endpoint()).map_err(|source| {
        LaunchError::Connect {
            channel: "response",
            source,
        }
    })?;
    let slave = Arc::new(
        Slave::new(inbound, outbound, SlaveSettings::from_config(&config)).with_reporter(reporter),
    );

    let shutdown = Arc::new(shutdown);
    let watcher = watch_for_shutdown(Arc::clone(&slave), Arc::clone(&shutdown))?;
    let served = slave.serve_till_shutdown();
    shutdown.close();
    let watched = watcher
        .join()
        .map_err(|_| LaunchError::ThreadPanic {
            thread: WATCHER_THREAD,
        })?;

    served?;
    watched?;
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}

fn watch_for_shutdown<S>(
    slave: Arc<Slave>,
    shutdown: Arc<S>,
) -> Result<JoinHandle<Result<(), ShutdownError>>, LaunchError>
where
    S: ShutdownSignal + 'static,
{
    thread::Builder::new()
        .name(String::from("vmslave-signals"))
        .spawn(move || {
            let requested = shutdown.wait();
            match &requested {
                Ok(true) => slave.shutdown(),
                Ok(false) => {}
                Err(error) => {
                    warn!(
                        target: PROCESS_TARGET,
                        %error,
                        "shutdown listener failed; draining"
                    );
                    slave.shutdown();
                }
            }
            requested.map(drop)
        })
        .map_err(|source| LaunchError::Thread {
            thread: WATCHER_THREAD,
            source,
        })
}
