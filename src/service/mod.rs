mod controller;
mod latch;
mod runner;
mod sequencer;
mod types;

#[cfg(test)]
mod tests;

pub use controller::LifecycleController;
pub use latch::StopSignal;
pub use runner::{run_service, run_service_with};
pub use sequencer::{ShutdownOutcome, ShutdownSequencer};
pub use types::{AcceptedControls, ControlCode, HandlerResult, LifecycleState, StatusReport};
