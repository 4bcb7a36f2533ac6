use super::{ControlSink, ServiceHost, StatusHandle};
use crate::error::{Result, ServiceError};
use crate::service::{ControlCode, HandlerResult, LifecycleState, StatusReport};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Error code attached to injected report failures
pub const INJECTED_FAILURE_CODE: i32 = 0x1f;

/// A status report as seen by the recording host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedReport {
    pub report: StatusReport,
    pub at: Instant,
    /// False when the host rejected it
    pub delivered: bool,
}

#[derive(Default)]
struct Journal {
    reports: Mutex<Vec<RecordedReport>>,
    changed: Condvar,
    failing_states: Mutex<Vec<LifecycleState>>,
    failing_attempts: Mutex<Vec<usize>>,
}

/// In-process host that records every report and lets the caller play the
/// service manager: deliver control codes, reject reports, drop the channel.
#[derive(Default)]
pub struct RecordingHost {
    journal: Arc<Journal>,
    sink: Mutex<Option<Arc<dyn ControlSink>>>,
    registered_name: Mutex<Option<String>>,
    refuse_registration: AtomicBool,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next registration fail
    pub fn refuse_registration(&self) {
        self.refuse_registration.store(true, Ordering::SeqCst);
    }

    /// Reject every report for `state` until cleared
    pub fn fail_reports_in(&self, state: LifecycleState) {
        self.journal.failing_states.lock().push(state);
    }

    /// Reject the report attempt with this zero-based index
    pub fn fail_report_attempt(&self, attempt: usize) {
        self.journal.failing_attempts.lock().push(attempt);
    }

    pub fn clear_failures(&self) {
        self.journal.failing_states.lock().clear();
        self.journal.failing_attempts.lock().clear();
    }

    pub fn registered_name(&self) -> Option<String> {
        self.registered_name.lock().clone()
    }

    /// Deliver a control code the way the service manager would.
    /// Returns `None` if nothing registered yet.
    pub fn deliver(&self, code: ControlCode) -> Option<HandlerResult> {
        let sink = self.sink.lock().clone()?;
        let result = sink.on_control(code);
        debug!("Delivered {} -> {:?}", code, result);
        Some(result)
    }

    /// Tell the registered sink that no more control codes will come
    pub fn drop_channel(&self, reason: &str) -> bool {
        match self.sink.lock().clone() {
            Some(sink) => {
                sink.on_channel_lost(reason);
                true
            }
            None => false,
        }
    }

    /// Every report attempt so far, rejected ones included
    pub fn reports(&self) -> Vec<RecordedReport> {
        self.journal.reports.lock().clone()
    }

    /// Reports the host accepted
    pub fn delivered_reports(&self) -> Vec<StatusReport> {
        self.journal
            .reports
            .lock()
            .iter()
            .filter(|r| r.delivered)
            .map(|r| r.report)
            .collect()
    }

    /// Block until a report for `state` was accepted, or the timeout passes
    pub fn wait_for_state(&self, state: LifecycleState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut reports = self.journal.reports.lock();
        loop {
            if reports
                .iter()
                .any(|r| r.delivered && r.report.state == state)
            {
                return true;
            }
            if self
                .journal
                .changed
                .wait_until(&mut reports, deadline)
                .timed_out()
            {
                return reports
                    .iter()
                    .any(|r| r.delivered && r.report.state == state);
            }
        }
    }
}

impl ServiceHost for RecordingHost {
    type Handle = RecordingStatusHandle;

    fn register(&self, name: &str, sink: Arc<dyn ControlSink>) -> Result<Self::Handle> {
        if self.refuse_registration.swap(false, Ordering::SeqCst) {
            return Err(ServiceError::registration(
                name,
                Some(INJECTED_FAILURE_CODE),
                "registration refused",
            ));
        }

        *self.sink.lock() = Some(sink);
        *self.registered_name.lock() = Some(name.to_string());

        Ok(RecordingStatusHandle {
            journal: Arc::clone(&self.journal),
        })
    }
}

/// Status handle handed out by [`RecordingHost`]
pub struct RecordingStatusHandle {
    journal: Arc<Journal>,
}

impl StatusHandle for RecordingStatusHandle {
    fn set_status(&self, report: &StatusReport) -> Result<()> {
        let mut reports = self.journal.reports.lock();
        let attempt = reports.len();
        let rejected = self.journal.failing_states.lock().contains(&report.state)
            || self.journal.failing_attempts.lock().contains(&attempt);

        reports.push(RecordedReport {
            report: *report,
            at: Instant::now(),
            delivered: !rejected,
        });
        self.journal.changed.notify_all();

        if rejected {
            return Err(ServiceError::report(
                report.state.to_string(),
                Some(INJECTED_FAILURE_CODE),
                "host rejected the report".to_string(),
            ));
        }
        Ok(())
    }
}
