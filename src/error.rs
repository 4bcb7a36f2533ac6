use thiserror::Error;

/// Exit status used when the working-directory override cannot be applied
pub const EXIT_WORKING_DIRECTORY: i32 = 9;

/// Exit status used when the host failed without giving an error code
pub const EXIT_HOST_FAILURE: i32 = 1;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Failed to register with the host as '{name}': {message}")]
    Registration {
        name: String,
        code: Option<i32>,
        message: String,
    },

    #[error("Failed to report {state} status: {message}")]
    Report {
        state: String,
        code: Option<i32>,
        message: String,
    },

    #[error("Stop signal unavailable: {message}")]
    StopSignal { message: String },

    #[error("Service dispatcher failed: {message}")]
    Dispatcher { code: Option<i32>, message: String },

    #[error("Failed to change working directory to {path}: {source}")]
    WorkingDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ServiceError {
    pub fn registration<S: Into<String>>(name: S, code: Option<i32>, message: S) -> Self {
        Self::Registration {
            name: name.into(),
            code,
            message: message.into(),
        }
    }

    pub fn report<S: Into<String>>(state: S, code: Option<i32>, message: S) -> Self {
        Self::Report {
            state: state.into(),
            code,
            message: message.into(),
        }
    }

    pub fn stop_signal<S: Into<String>>(message: S) -> Self {
        Self::StopSignal {
            message: message.into(),
        }
    }

    /// Host-specific error code carried by this error, if any
    pub fn host_code(&self) -> Option<i32> {
        match self {
            Self::Registration { code, .. }
            | Self::Report { code, .. }
            | Self::Dispatcher { code, .. } => *code,
            _ => None,
        }
    }

    /// Process exit status for a failure that ends the run
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::WorkingDirectory { .. } => EXIT_WORKING_DIRECTORY,
            _ => self
                .host_code()
                .filter(|code| *code != 0)
                .unwrap_or(EXIT_HOST_FAILURE),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
