pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod service;

pub use config::{ServiceConfig, ShutdownConfig, SERVICE_NAME};
pub use error::{Result, ServiceError};
pub use host::{ConsoleHost, ControlSink, RecordingHost, ServiceHost, StatusHandle};
pub use service::{
    run_service, run_service_with, AcceptedControls, ControlCode, HandlerResult,
    LifecycleController, LifecycleState, ShutdownOutcome, ShutdownSequencer, StatusReport,
    StopSignal,
};

#[cfg(windows)]
pub use host::WindowsHost;
