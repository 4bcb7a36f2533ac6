//! Host environments the service lifecycle can run under.
//!
//! A host hands out a [`StatusHandle`] at registration time and delivers
//! control requests to a [`ControlSink`] from its own thread.

use crate::error::Result;
use crate::service::{ControlCode, HandlerResult, StatusReport};
use std::sync::Arc;

pub mod console;
pub mod recording;
#[cfg(windows)]
pub mod windows;

pub use console::{ConsoleHost, ConsoleStatusHandle};
pub use recording::{RecordedReport, RecordingHost, RecordingStatusHandle};
#[cfg(windows)]
pub use windows::{WindowsHost, WindowsStatusHandle};

/// Channel through which status reports reach the host
pub trait StatusHandle: Send + Sync {
    fn set_status(&self, report: &StatusReport) -> Result<()>;
}

/// Receiver of host control requests, invoked on a host-owned thread
pub trait ControlSink: Send + Sync {
    /// Handle one control request and answer synchronously
    fn on_control(&self, code: ControlCode) -> HandlerResult;

    /// The host can no longer deliver control requests
    fn on_channel_lost(&self, reason: &str);
}

/// Service manager the process registers with
pub trait ServiceHost {
    type Handle: StatusHandle + 'static;

    /// Register `name` and route control requests to `sink`
    fn register(&self, name: &str, sink: Arc<dyn ControlSink>) -> Result<Self::Handle>;
}
