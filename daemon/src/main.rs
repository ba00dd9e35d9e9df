use anyhow::{Context, Result};
use clap::Parser;
use loadgate_daemon::{
    config::{Config, LogFormat, LoggingConfig},
    executor::{CommandController, DryRunController, WorkloadController},
    monitor::{MonitorLoop, MonitorSettings},
    sampler::ProcStatSampler,
};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "loadgated",
    about = "Suspend a background workload while the host is busy"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Validate the config, print the effective settings, and exit.
    #[arg(long)]
    check_config: bool,

    /// Log the control commands instead of running them.
    #[arg(long)]
    dry_run: bool,
}

/// Use `RUST_LOG` when it parses, otherwise the configured level. A
/// rejected `RUST_LOG` is handed back so it can be reported once logging
/// is up.
fn log_filter(rust_log: Option<&str>, level: &str) -> Result<(EnvFilter, Option<String>)> {
    let rejected = match rust_log.map(EnvFilter::try_new) {
        Some(Ok(filter)) => return Ok((filter, None)),
        Some(Err(e)) => Some(e.to_string()),
        None => None,
    };
    let filter = EnvFilter::try_new(level)
        .with_context(|| format!("invalid log level {:?}", level))?;
    Ok((filter, rejected))
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty());
    install_subscriber(logging, rust_log.as_deref())
}

fn install_subscriber(logging: &LoggingConfig, rust_log: Option<&str>) -> Result<()> {
    let (filter, rejected) = log_filter(rust_log, &logging.level)?;

    let (writer, ansi) = match &logging.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi);
    match logging.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }

    if let Some(e) = rejected {
        warn!("Ignoring invalid RUST_LOG: {}", e);
    }
    Ok(())
}

/// Monitor settings from `config`; an invalid config is logged before it
/// is returned.
fn validated_settings(config: &Config) -> Result<MonitorSettings> {
    config.monitor_settings().map_err(|e| {
        error!("Invalid configuration, not starting: {}", e);
        e.into()
    })
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

async fn run_monitor<C>(config: &Config, settings: MonitorSettings, controller: C)
where
    C: WorkloadController,
{
    let sampler = ProcStatSampler::with_path(&config.general.load_source);
    info!("Sampling load from {}", sampler.path().display());
    let monitor = MonitorLoop::new(sampler, controller, settings);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_shutdown().await;
        let _ = shutdown_tx.send(true);
    });

    monitor.run(shutdown_rx).await;
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    let (config, loaded) = Config::load_or_default(&config_path)?;

    if cli.check_config {
        config.validate()?;
        println!("# {}", config_path.display());
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    init_logging(&config.logging)?;
    info!("loadgate daemon starting...");
    if loaded {
        info!("Loaded config from {}", config_path.display());
    } else {
        info!(
            "No config file at {}, using defaults",
            config_path.display()
        );
    }
    let settings = validated_settings(&config)?;

    let start = &config.control.start_command;
    let stop = &config.control.stop_command;
    if cli.dry_run {
        warn!("Dry run: control commands will only be logged");
        run_monitor(&config, settings, DryRunController::new(start, stop)).await;
    } else {
        let controller = CommandController::new(start, stop, config.command_timeout());
        run_monitor(&config, settings, controller).await;
    }

    Ok(())
}
