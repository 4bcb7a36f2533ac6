//! Service Control Manager host.

use super::{ControlSink, ServiceHost, StatusHandle};
use crate::config::ShutdownConfig;
use crate::error::{Result, ServiceError};
use crate::service::{run_service, ControlCode, HandlerResult, LifecycleState, StatusReport};
use parking_lot::{const_mutex, Mutex};
use std::ffi::OsString;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{error, info};
use windows_service::service::{
    ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceState, ServiceStatus,
    ServiceType,
};
use windows_service::service_control_handler::{
    self, ServiceControlHandlerResult, ServiceStatusHandle,
};
use windows_service::{define_windows_service, service_dispatcher};

/// What the dispatcher thread needs to run the service body.
/// The SCM entry point is a plain function, so it is handed over here.
struct Launch {
    name: String,
    shutdown: ShutdownConfig,
}

static LAUNCH: OnceLock<Launch> = OnceLock::new();

/// Failure of the service body, read back once the dispatcher returns
static SERVICE_FAILURE: Mutex<Option<ServiceError>> = const_mutex(None);

define_windows_service!(ffi_service_main, service_main);

/// Connect to the SCM and block until the service has stopped
pub fn run_dispatcher(name: &str, shutdown: ShutdownConfig) -> Result<()> {
    LAUNCH
        .set(Launch {
            name: name.to_string(),
            shutdown,
        })
        .map_err(|_| ServiceError::Dispatcher {
            code: None,
            message: "dispatcher already started".to_string(),
        })?;

    let dispatched = service_dispatcher::start(name, ffi_service_main);
    dispatch_result(dispatched, &SERVICE_FAILURE)
}

/// Combine the dispatcher's own result with a failure recorded by the
/// service body. A dispatcher error wins since the body never ran.
fn dispatch_result(
    dispatched: windows_service::Result<()>,
    failure: &Mutex<Option<ServiceError>>,
) -> Result<()> {
    if let Err(e) = dispatched {
        return Err(ServiceError::Dispatcher {
            code: win32_code(&e),
            message: e.to_string(),
        });
    }

    match failure.lock().take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn service_main(_arguments: Vec<OsString>) {
    let Some(launch) = LAUNCH.get() else {
        error!("ERROR: Service started without a launch configuration");
        return;
    };

    match run_service(&WindowsHost, &launch.name, launch.shutdown) {
        Ok(outcome) => info!("Service main finished: {:?}", outcome),
        Err(e) => {
            error!("ERROR: Service main failed: {}", e);
            *SERVICE_FAILURE.lock() = Some(e);
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsHost;

impl ServiceHost for WindowsHost {
    type Handle = WindowsStatusHandle;

    fn register(&self, name: &str, sink: Arc<dyn ControlSink>) -> Result<Self::Handle> {
        let handler = move |control: ServiceControl| -> ServiceControlHandlerResult {
            match sink.on_control(to_control_code(&control)) {
                HandlerResult::Accepted => ServiceControlHandlerResult::NoError,
                HandlerResult::NotImplemented => ServiceControlHandlerResult::NotImplemented,
            }
        };

        let handle = service_control_handler::register(name, handler).map_err(|e| {
            ServiceError::registration(name.to_string(), win32_code(&e), e.to_string())
        })?;

        Ok(WindowsStatusHandle { handle })
    }
}

pub struct WindowsStatusHandle {
    handle: ServiceStatusHandle,
}

impl StatusHandle for WindowsStatusHandle {
    fn set_status(&self, report: &StatusReport) -> Result<()> {
        self.handle
            .set_service_status(to_service_status(report))
            .map_err(|e| {
                ServiceError::report(report.state.to_string(), win32_code(&e), e.to_string())
            })
    }
}

fn to_control_code(control: &ServiceControl) -> ControlCode {
    match control {
        ServiceControl::Stop => ControlCode::Stop,
        ServiceControl::Shutdown => ControlCode::Shutdown,
        ServiceControl::Preshutdown => ControlCode::PreShutdown,
        ServiceControl::Interrogate => ControlCode::Interrogate,
        other => ControlCode::Unknown(other.raw_service_control_type()),
    }
}

fn to_service_status(report: &StatusReport) -> ServiceStatus {
    let mut controls_accepted = ServiceControlAccept::empty();
    if report.accepted_controls.stop {
        controls_accepted |= ServiceControlAccept::STOP;
    }
    if report.accepted_controls.shutdown {
        controls_accepted |= ServiceControlAccept::SHUTDOWN;
    }
    if report.accepted_controls.pre_shutdown {
        controls_accepted |= ServiceControlAccept::PRESHUTDOWN;
    }

    ServiceStatus {
        service_type: ServiceType::OWN_PROCESS,
        current_state: match report.state {
            LifecycleState::Starting => ServiceState::StartPending,
            LifecycleState::Running => ServiceState::Running,
            LifecycleState::StopPending => ServiceState::StopPending,
            LifecycleState::Stopped => ServiceState::Stopped,
        },
        controls_accepted,
        exit_code: ServiceExitCode::Win32(0),
        checkpoint: report.checkpoint,
        wait_hint: Duration::from_millis(u64::from(report.wait_hint_millis)),
        process_id: None,
    }
}

fn win32_code(error: &windows_service::Error) -> Option<i32> {
    match error {
        windows_service::Error::Winapi(io) => io.raw_os_error(),
        _ => None,
    }
}
