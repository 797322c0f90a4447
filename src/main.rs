//! # Sensor Logger
//!
//! Record multi-channel chemical sensor readings from a serial port.
//!
//! # Usage
//!
//! ```text
//! sensor-logger [--config PATH] ports
//! sensor-logger [--config PATH] record <label> [output.csv]
//! ```
//!
//! `record` connects to the configured port, collects until Ctrl+C (or until
//! the session fails on its own), then prints where the data went.
//!
//! Expected output:
//! ```text
//! INFO sensor_logger::serial: Connection successful: /dev/ttyUSB0, 9600 baud
//! INFO sensor_logger::recording::sink: Data will be saved to 'data/sensor_data_Coffee_20261017_101500.csv' (64 features)
//! INFO sensor_logger::acquisition::worker: Data points collected: 10, Elapsed time: 10.0 seconds
//! ```

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use sensor_logger::config::{Config, LoggingConfig};
use sensor_logger::handoff::{self, LocalArchive, LogNotifier, Notifier, Uploader};
use sensor_logger::serial;
use sensor_logger::session::SessionController;

/// Used when `--config` is not given and the file exists
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

const USAGE: &str = "usage: sensor-logger [--config PATH] (ports | record <label> [output.csv])";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Ports,
    Record { label: String, output: Option<PathBuf> },
}

#[derive(Debug)]
struct Args {
    config: Option<PathBuf>,
    command: Command,
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<Args> {
    let mut config = None;
    let mut rest = Vec::new();

    while let Some(arg) = args.next() {
        if arg == "--config" {
            let path = args.next().context("--config needs a path")?;
            config = Some(PathBuf::from(path));
        } else {
            rest.push(arg);
        }
    }

    let command = match rest.as_slice() {
        [cmd] if cmd == "ports" => Command::Ports,
        [cmd, label] if cmd == "record" => Command::Record { label: label.clone(), output: None },
        [cmd, label, output] if cmd == "record" => Command::Record {
            label: label.clone(),
            output: Some(PathBuf::from(output)),
        },
        _ => bail!(USAGE),
    };

    Ok(Args { config, command })
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Config::load(DEFAULT_CONFIG_PATH).with_context(|| format!("loading {}", DEFAULT_CONFIG_PATH))
        }
        None => Ok(Config::default()),
    }
}

/// Console logging, plus a daily rolling file when enabled
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    if config.file_logging {
        let appender = tracing_appender::rolling::daily(&config.log_dir, "sensor-logger.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        registry.with(fmt::layer().with_writer(writer).with_ansi(false)).init();
        Some(guard)
    } else {
        registry.init();
        None
    }
}

fn list_ports() -> Result<()> {
    let ports = serial::list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found!");
        return Ok(());
    }

    println!("Available serial ports:");
    for (i, port) in ports.iter().enumerate() {
        println!("{}. {} - {}", i + 1, port.name, port.description);
    }
    Ok(())
}

async fn record(config: &Config, label: &str, output: Option<PathBuf>) -> Result<()> {
    let mut controller = SessionController::new(config.session_settings());
    controller
        .connect(&config.serial.port, config.serial.baud_rate)
        .await
        .with_context(|| format!("connecting to {}", config.serial.port))?;

    if let Err(e) = controller.start(label, output).await {
        controller.close().await;
        return Err(e).context("starting data collection");
    }
    info!("Data collection started. Press Ctrl+C to stop.");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, stopping...");
        }
        state = controller.wait_finished() => {
            warn!("Data collection ended on its own ({:?})", state);
        }
    }

    let Some(summary) = controller.close().await else {
        return Ok(());
    };

    let last = handoff::last_reading(&summary.path).unwrap_or_else(|e| {
        warn!("Could not read back {}: {}", summary.path.display(), e);
        None
    });
    LogNotifier.notify(&handoff::summarize(&summary, last.as_deref())).await?;

    if config.archive.enabled {
        LocalArchive::new(&config.archive.dir)
            .upload(&summary.path)
            .await
            .context("archiving session file")?;
    }

    println!("Collected data: {}", summary.path.display());
    if summary.failed() {
        bail!("session failed: {}", summary.failure.unwrap_or_default());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    let config = load_config(args.config.as_deref())?;
    let _log_guard = init_logging(&config.logging);

    info!("Sensor Logger v{} starting...", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Ports => list_ports(),
        Command::Record { label, output } => record(&config, &label, output).await,
    }
}
