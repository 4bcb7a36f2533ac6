use clap::Parser;
use graceful_service::logging::{self, LogFormat, LogOptions};
use graceful_service::{ServiceConfig, ServiceError};
use std::path::PathBuf;
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[command(name = "graceful-service")]
#[command(about = "A service that counts down before terminating when asked to stop")]
#[command(version)]
#[command(long_about = "Runs as a Windows service (or in the foreground with --console) and, \
when the service manager asks it to stop, keeps reporting Stop Pending once a second for the \
configured number of seconds before it reports Stopped and exits.")]
struct Args {
    /// Seconds to count down once a stop is requested
    #[arg(value_name = "SECONDS")]
    countdown: Option<u32>,

    /// Directory to switch to before starting
    #[arg(value_name = "WORKING_DIRECTORY")]
    working_directory: Option<PathBuf>,

    /// "t" to listen for pre-shutdown instead of shutdown
    #[arg(value_name = "PRE_SHUTDOWN")]
    pre_shutdown: Option<String>,

    /// Path to configuration file
    #[arg(short, long, default_value = "graceful-service.toml")]
    config: String,

    /// Run in the foreground instead of under the service manager
    #[arg(long)]
    console: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    /// Console log format
    #[arg(long, value_enum, default_value_t = LogFormat::Full)]
    log_format: LogFormat,

    /// Do not append to the log file
    #[arg(long)]
    no_log_file: bool,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    let args = Args::parse();
    std::process::exit(run(args));
}

fn run(args: Args) -> i32 {
    if args.print_config {
        return match ServiceConfig::default().to_toml() {
            Ok(rendered) => {
                println!("{}", rendered);
                0
            }
            Err(e) => {
                eprintln!("Failed to render default configuration: {}", e);
                1
            }
        };
    }

    let mut config = match ServiceConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            let e = ServiceError::from(e);
            eprintln!("Failed to load configuration: {}", e);
            return e.exit_code();
        }
    };
    config.apply_launch_args(
        args.countdown,
        args.working_directory.clone(),
        args.pre_shutdown.as_deref(),
    );
    if let Err(e) = config.validate() {
        let e = ServiceError::from(e);
        eprintln!("Configuration validation failed: {}", e);
        return e.exit_code();
    }

    if let Some(dir) = &config.service.working_directory {
        if let Err(source) = std::env::set_current_dir(dir) {
            let e = ServiceError::WorkingDirectory {
                path: dir.display().to_string(),
                source,
            };
            eprintln!("{}", e);
            return e.exit_code();
        }
    }

    let log_file = (config.logging.enabled && !args.no_log_file)
        .then(|| PathBuf::from(&config.logging.file));
    let level = if args.debug {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };
    let _log_guard = match logging::init(&LogOptions {
        level,
        format: args.log_format,
        file: log_file.as_deref(),
    }) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return 1;
        }
    };

    info!("Running (pid={})...", std::process::id());

    let exit_code = match dispatch(&config, args.console) {
        Ok(()) => 0,
        Err(e) => {
            error!("ERROR: {}", e);
            e.exit_code()
        }
    };

    info!("Bye bye...");
    exit_code
}

#[cfg(windows)]
fn dispatch(config: &ServiceConfig, console: bool) -> graceful_service::Result<()> {
    if console {
        return run_in_console(config);
    }
    graceful_service::host::windows::run_dispatcher(&config.service.name, config.shutdown)
}

#[cfg(not(windows))]
fn dispatch(config: &ServiceConfig, _console: bool) -> graceful_service::Result<()> {
    run_in_console(config)
}

fn run_in_console(config: &ServiceConfig) -> graceful_service::Result<()> {
    let outcome = graceful_service::run_service(
        &graceful_service::ConsoleHost::new(),
        &config.service.name,
        config.shutdown,
    )?;
    info!(
        "Shutdown finished after {} tick(s), {} failed report(s)",
        outcome.ticks, outcome.failed_reports
    );
    Ok(())
}
