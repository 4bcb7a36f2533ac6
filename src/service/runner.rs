use super::controller::LifecycleController;
use super::sequencer::{ShutdownOutcome, ShutdownSequencer};
use crate::config::ShutdownConfig;
use crate::error::Result;
use crate::host::ServiceHost;
use tracing::error;

/// Run one full service lifecycle against `host`: register, announce
/// `Running`, wait for a stop, count down and report `Stopped`.
pub fn run_service<S: ServiceHost>(
    host: &S,
    name: &str,
    config: ShutdownConfig,
) -> Result<ShutdownOutcome> {
    run_service_with(host, name, config, ShutdownSequencer::new(&config))
}

/// Same as [`run_service`] with a caller-supplied sequencer
pub fn run_service_with<S: ServiceHost>(
    host: &S,
    name: &str,
    config: ShutdownConfig,
    sequencer: ShutdownSequencer,
) -> Result<ShutdownOutcome> {
    let controller = LifecycleController::<S::Handle>::new(config);

    if let Err(e) = controller.register_with_host(host, name) {
        error!("ERROR: Failed to register the control handler: {}", e);
        return Err(e);
    }

    if let Err(e) = controller.start() {
        error!("ERROR: Failed to report Running: {}", e);
        if let Err(e) = controller.finish() {
            error!("ERROR: Failed to report Stopped: {}", e);
        }
        return Err(e);
    }

    Ok(sequencer.run(&controller))
}
