use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name under which the process registers with the service manager
pub const SERVICE_NAME: &str = "graceful-terminating-windows-service";

/// Launch-parameter value that selects the pre-shutdown notification
pub const PRE_SHUTDOWN_FLAG: &str = "t";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServiceConfig {
    pub shutdown: ShutdownConfig,
    pub service: HostConfig,
    pub logging: LoggingConfig,
}

/// Graceful shutdown behavior, fixed for the lifetime of the process
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownConfig {
    /// Seconds to count down once a stop is requested
    #[serde(default = "default_countdown_seconds")]
    pub countdown_seconds: u32,

    /// Listen for the pre-shutdown notification instead of shutdown
    #[serde(default)]
    pub prefer_pre_shutdown: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HostConfig {
    /// Registration name
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Directory to switch to before starting
    pub working_directory: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Append diagnostics to a file in the working directory
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,

    /// Log file name
    #[serde(default = "default_log_file")]
    pub file: String,
}

impl ServiceConfig {
    /// Load configuration from an optional file plus `GRACEFUL__*` environment variables
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("shutdown.countdown_seconds", default_countdown_seconds())?
            .set_default("shutdown.prefer_pre_shutdown", false)?
            .set_default("service.name", default_service_name())?
            .set_default("logging.enabled", default_log_enabled())?
            .set_default("logging.file", default_log_file())?
            .add_source(File::with_name(&path_str).required(false))
            .add_source(
                Environment::with_prefix("GRACEFUL")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ServiceConfig = settings.try_deserialize()?;
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Apply the positional launch parameters on top of the loaded values
    pub fn apply_launch_args(
        &mut self,
        countdown_seconds: Option<u32>,
        working_directory: Option<PathBuf>,
        pre_shutdown: Option<&str>,
    ) {
        if let Some(seconds) = countdown_seconds {
            self.shutdown.countdown_seconds = seconds;
        }
        if let Some(dir) = working_directory {
            self.service.working_directory = Some(dir);
        }
        if let Some(flag) = pre_shutdown {
            self.shutdown.prefer_pre_shutdown = flag == PRE_SHUTDOWN_FLAG;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.name.trim().is_empty() {
            return Err(ConfigError::Message(
                "Service name must not be empty".to_string(),
            ));
        }

        if self.logging.enabled && self.logging.file.trim().is_empty() {
            return Err(ConfigError::Message(
                "Log file name must not be empty when file logging is enabled".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            shutdown: ShutdownConfig::default(),
            service: HostConfig {
                name: default_service_name(),
                working_directory: None,
            },
            logging: LoggingConfig {
                enabled: default_log_enabled(),
                file: default_log_file(),
            },
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            countdown_seconds: default_countdown_seconds(),
            prefer_pre_shutdown: false,
        }
    }
}

fn default_countdown_seconds() -> u32 {
    10
}

fn default_service_name() -> String {
    SERVICE_NAME.to_string()
}

fn default_log_enabled() -> bool {
    true
}
fn default_log_file() -> String {
    "graceful-terminating-windows-service.log".to_string()
}
