use super::controller::LifecycleController;
use crate::config::ShutdownConfig;
use crate::host::StatusHandle;
use std::thread;
use std::time::Duration;
use tracing::{error, info};

/// Summary of one shutdown sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownOutcome {
    /// Countdown ticks attempted
    pub ticks: u32,
    /// Reports the host rejected, terminal report included
    pub failed_reports: u32,
    /// The stop signal failed and the countdown was skipped
    pub countdown_skipped: bool,
}

/// Runs the bounded countdown between a stop request and the terminal report
#[derive(Debug, Clone)]
pub struct ShutdownSequencer {
    countdown_seconds: u32,
    tick: Duration,
}

impl ShutdownSequencer {
    pub fn new(config: &ShutdownConfig) -> Self {
        Self {
            countdown_seconds: config.countdown_seconds,
            tick: Duration::from_secs(1),
        }
    }

    /// Override the pause between countdown reports
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Park until a stop is requested, count down, then report `Stopped`
    pub fn run<H: StatusHandle + 'static>(
        &self,
        controller: &LifecycleController<H>,
    ) -> ShutdownOutcome {
        let mut outcome = ShutdownOutcome::default();

        match controller.wait_for_stop() {
            Ok(()) => self.count_down(controller, &mut outcome),
            Err(e) => {
                error!("ERROR: Failed to wait for the stop event: {}", e);
                outcome.countdown_skipped = true;
            }
        }

        if let Err(e) = controller.finish() {
            error!("ERROR: Failed to report Stopped: {}", e);
            outcome.failed_reports += 1;
        }

        outcome
    }

    fn count_down<H: StatusHandle + 'static>(
        &self,
        controller: &LifecycleController<H>,
        outcome: &mut ShutdownOutcome,
    ) {
        for remaining in (1..=self.countdown_seconds).rev() {
            info!("Gracefully terminating the application in T-{}...", remaining);

            if let Err(e) = controller.report_countdown(remaining) {
                error!("ERROR: Failed to report Stop Pending T-{}: {}", remaining, e);
                outcome.failed_reports += 1;
            }
            outcome.ticks += 1;

            thread::sleep(self.tick);
        }
    }
}
