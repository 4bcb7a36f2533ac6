use super::latch::StopSignal;
use super::types::{AcceptedControls, ControlCode, HandlerResult, LifecycleState, StatusReport};
use crate::config::ShutdownConfig;
use crate::error::{Result, ServiceError};
use crate::host::{ControlSink, ServiceHost, StatusHandle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

/// Single owner of the service lifecycle state and of the channel that
/// reports it to the host.
///
/// One instance exists per process. It is shared between the host's
/// notification thread (through [`ControlSink`]) and the main path, which
/// parks on the stop signal and then drives the countdown.
pub struct LifecycleController<H> {
    config: ShutdownConfig,
    handle: OnceLock<H>,
    state: Mutex<LifecycleState>,
    stop_signal: StopSignal,
    // Only the main path advances this during the countdown
    checkpoint: AtomicU32,
}

impl<H: StatusHandle + 'static> LifecycleController<H> {
    pub fn new(config: ShutdownConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            handle: OnceLock::new(),
            state: Mutex::new(LifecycleState::Starting),
            stop_signal: StopSignal::new(),
            checkpoint: AtomicU32::new(0),
        })
    }

    /// Register with the host. Must happen once, before any status report.
    pub fn register_with_host<S>(self: &Arc<Self>, host: &S, name: &str) -> Result<()>
    where
        S: ServiceHost<Handle = H>,
    {
        let sink: Arc<dyn ControlSink> = Arc::clone(self) as Arc<dyn ControlSink>;
        let handle = host.register(name, sink)?;

        self.handle
            .set(handle)
            .map_err(|_| ServiceError::registration(name, None, "already registered"))?;

        info!("Registered control handler as '{}'", name);
        Ok(())
    }

    /// Push a report to the host
    pub fn report_state(&self, report: &StatusReport) -> Result<()> {
        let handle = self.handle.get().ok_or_else(|| {
            ServiceError::report(
                report.state.to_string(),
                None,
                "not registered with the host".to_string(),
            )
        })?;
        handle.set_status(report)
    }

    /// Announce `Running` together with the controls this process accepts
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.can_transition_to(LifecycleState::Running) {
            return Err(ServiceError::report(
                LifecycleState::Running.to_string(),
                None,
                format!("service is already {}", *state),
            ));
        }

        self.report_state(&StatusReport::running(self.accepted_controls()))?;
        *state = LifecycleState::Running;
        info!("Service is running");
        Ok(())
    }

    /// Controls advertised while running
    pub fn accepted_controls(&self) -> AcceptedControls {
        AcceptedControls::for_running(self.config.prefer_pre_shutdown)
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_signal.is_set()
    }

    /// Park the calling thread until a stop is requested
    pub fn wait_for_stop(&self) -> Result<()> {
        self.stop_signal.wait()
    }

    /// Report one countdown tick with the next checkpoint
    pub fn report_countdown(&self, remaining_seconds: u32) -> Result<StatusReport> {
        let _state = self.state.lock();
        let checkpoint = self.checkpoint.fetch_add(1, Ordering::SeqCst) + 1;
        let report =
            StatusReport::stop_pending(remaining_seconds.saturating_mul(1000), checkpoint);
        self.report_state(&report)?;
        Ok(report)
    }

    /// Enter the terminal state and report it. Best effort.
    pub fn finish(&self) -> Result<()> {
        let mut state = self.state.lock();
        *state = LifecycleState::Stopped;
        self.report_state(&StatusReport::stopped())
    }

    fn request_stop(&self) -> HandlerResult {
        let mut state = self.state.lock();
        match *state {
            LifecycleState::Starting => {
                warn!("Stop requested before the service is running");
                HandlerResult::NotImplemented
            }
            LifecycleState::StopPending | LifecycleState::Stopped => {
                debug!("Stop already in progress");
                HandlerResult::Accepted
            }
            LifecycleState::Running => {
                let report = StatusReport::stop_pending(
                    self.config.countdown_seconds.saturating_mul(1000),
                    self.checkpoint.load(Ordering::SeqCst),
                );
                if let Err(e) = self.report_state(&report) {
                    error!("ERROR: Failed to report Stop Pending: {}", e);
                    return HandlerResult::NotImplemented;
                }

                // State and latch change together under the lock
                *state = LifecycleState::StopPending;
                self.stop_signal.set();
                HandlerResult::Accepted
            }
        }
    }
}

impl<H: StatusHandle + 'static> ControlSink for LifecycleController<H> {
    fn on_control(&self, code: ControlCode) -> HandlerResult {
        info!("serviceControlHandler {}", code);
        match code {
            ControlCode::Stop | ControlCode::Shutdown | ControlCode::PreShutdown => {
                if !self.accepted_controls().contains(code) {
                    debug!("{} was not advertised, handling it as a stop request", code);
                }
                self.request_stop()
            }
            ControlCode::Interrogate => HandlerResult::Accepted,
            ControlCode::Unknown(_) => HandlerResult::NotImplemented,
        }
    }

    fn on_channel_lost(&self, reason: &str) {
        if self.stop_signal.close(reason) {
            error!("ERROR: Control notifications lost: {}", reason);
        }
    }
}
