use std::fmt;

/// Service lifecycle states, in the only order they may occur
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Starting,
    Running,
    StopPending,
    Stopped,
}

impl LifecycleState {
    /// Whether moving to `next` keeps the lifecycle strictly forward
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        next > self
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::StopPending => "Stop Pending",
            Self::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}

/// Control request delivered by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCode {
    Stop,
    Shutdown,
    PreShutdown,
    Interrogate,
    Unknown(u32),
}

impl ControlCode {
    /// Stop, shutdown and pre-shutdown all start the same graceful termination
    pub fn is_stop_class(self) -> bool {
        matches!(self, Self::Stop | Self::Shutdown | Self::PreShutdown)
    }
}

impl fmt::Display for ControlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stop => f.write_str("SERVICE_CONTROL_STOP"),
            Self::Shutdown => f.write_str("SERVICE_CONTROL_SHUTDOWN"),
            Self::PreShutdown => f.write_str("SERVICE_CONTROL_PRESHUTDOWN"),
            Self::Interrogate => f.write_str("SERVICE_CONTROL_INTERROGATE"),
            Self::Unknown(code) => write!(f, "0x{:x}", code),
        }
    }
}

/// Answer returned to the host for a control request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerResult {
    Accepted,
    NotImplemented,
}

/// Set of control requests the service declares it will honor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcceptedControls {
    pub stop: bool,
    pub shutdown: bool,
    pub pre_shutdown: bool,
}

impl AcceptedControls {
    /// Accepts nothing; advertised while stopping
    pub const NONE: Self = Self {
        stop: false,
        shutdown: false,
        pre_shutdown: false,
    };

    /// Controls advertised while running: stop plus one of shutdown or pre-shutdown
    pub fn for_running(prefer_pre_shutdown: bool) -> Self {
        Self {
            stop: true,
            shutdown: !prefer_pre_shutdown,
            pre_shutdown: prefer_pre_shutdown,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    pub fn contains(&self, code: ControlCode) -> bool {
        match code {
            ControlCode::Stop => self.stop,
            ControlCode::Shutdown => self.shutdown,
            ControlCode::PreShutdown => self.pre_shutdown,
            ControlCode::Interrogate | ControlCode::Unknown(_) => false,
        }
    }
}

/// Status pushed to the host on every state change and countdown tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub state: LifecycleState,
    pub accepted_controls: AcceptedControls,
    pub wait_hint_millis: u32,
    pub checkpoint: u32,
}

impl StatusReport {
    pub fn running(accepted_controls: AcceptedControls) -> Self {
        Self {
            state: LifecycleState::Running,
            accepted_controls,
            wait_hint_millis: 0,
            checkpoint: 0,
        }
    }

    pub fn stop_pending(wait_hint_millis: u32, checkpoint: u32) -> Self {
        Self {
            state: LifecycleState::StopPending,
            accepted_controls: AcceptedControls::NONE,
            wait_hint_millis,
            checkpoint,
        }
    }

    pub fn stopped() -> Self {
        Self {
            state: LifecycleState::Stopped,
            accepted_controls: AcceptedControls::NONE,
            wait_hint_millis: 0,
            checkpoint: 0,
        }
    }
}
