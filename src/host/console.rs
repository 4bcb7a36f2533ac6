use super::{ControlSink, ServiceHost, StatusHandle};
use crate::error::{Result, ServiceError};
use crate::service::{ControlCode, StatusReport};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info};

/// Foreground host: OS signals stand in for service manager controls and
/// status reports go to the log.
///
/// Ctrl+C is delivered as `Stop`. On Unix, SIGTERM is delivered as
/// `Shutdown` and SIGHUP as `Interrogate`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleHost;

impl ConsoleHost {
    pub fn new() -> Self {
        Self
    }
}

impl ServiceHost for ConsoleHost {
    type Handle = ConsoleStatusHandle;

    fn register(&self, name: &str, sink: Arc<dyn ControlSink>) -> Result<Self::Handle> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                ServiceError::registration(name.to_string(), e.raw_os_error(), e.to_string())
            })?;

        thread::Builder::new()
            .name("control-notifier".to_string())
            .spawn(move || runtime.block_on(listen_for_signals(sink)))
            .map_err(|e| {
                ServiceError::registration(name.to_string(), e.raw_os_error(), e.to_string())
            })?;

        info!("Running in console mode - press Ctrl+C to stop");
        Ok(ConsoleStatusHandle {
            name: name.to_string(),
        })
    }
}

/// Status handle that writes each report to the diagnostics sink
#[derive(Debug, Clone)]
pub struct ConsoleStatusHandle {
    name: String,
}

impl StatusHandle for ConsoleStatusHandle {
    fn set_status(&self, report: &StatusReport) -> Result<()> {
        info!(
            "[{}] status {} (accepts: {:?}, wait hint: {}ms, checkpoint: {})",
            self.name,
            report.state,
            report.accepted_controls,
            report.wait_hint_millis,
            report.checkpoint
        );
        Ok(())
    }
}

fn deliver(sink: &dyn ControlSink, code: ControlCode) {
    let result = sink.on_control(code);
    debug!("Control {} answered with {:?}", code, result);
}

#[cfg(unix)]
async fn listen_for_signals(sink: Arc<dyn ControlSink>) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut terminate, mut hangup) =
        match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
            (Ok(terminate), Ok(hangup)) => (terminate, hangup),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to register signal handlers: {}", e);
                sink.on_channel_lost(&format!("signal handlers unavailable: {}", e));
                return;
            }
        };

    loop {
        let code = tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => ControlCode::Stop,
                Err(e) => {
                    sink.on_channel_lost(&format!("Ctrl+C handler failed: {}", e));
                    return;
                }
            },
            Some(()) = terminate.recv() => ControlCode::Shutdown,
            Some(()) = hangup.recv() => ControlCode::Interrogate,
        };
        deliver(sink.as_ref(), code);
    }
}

#[cfg(not(unix))]
async fn listen_for_signals(sink: Arc<dyn ControlSink>) {
    loop {
        match tokio::signal::ctrl_c().await {
            Ok(()) => deliver(sink.as_ref(), ControlCode::Stop),
            Err(e) => {
                error!("Ctrl+C handler failed: {}", e);
                sink.on_channel_lost(&format!("Ctrl+C handler failed: {}", e));
                return;
            }
        }
    }
}
