use crate::config::LogLevel;
use anyhow::{anyhow, Context, Result};
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

/// Where tracing output goes
pub enum LogDestination {
    /// Chat mode: keep the terminal clean for the conversation
    File(PathBuf),
    Stderr,
}

/// Build the filter directive from `LOG_LEVEL` and the number of `-v` flags
pub fn filter_directive(level: LogLevel, verbose_level: u8) -> String {
    let crate_level = match verbose_level {
        0 => level.as_directive(),
        1 => "debug",
        _ => "trace",
    };
    let dependency_level = match level {
        LogLevel::Error | LogLevel::Critical if verbose_level == 0 => "error",
        _ => "warn",
    };
    format!("{dependency_level},research_assistant={crate_level},llm={crate_level},papers={crate_level}")
}

pub fn setup_logging(level: LogLevel, verbose_level: u8, destination: LogDestination) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        // Use RUST_LOG if set
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        tracing_subscriber::EnvFilter::new(filter_directive(level, verbose_level))
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_level(true);

    match destination {
        LogDestination::File(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            subscriber
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow!("Failed to initialize logging: {e}"))
        }
        LogDestination::Stderr => subscriber
            .with_writer(io::stderr)
            .try_init()
            .map_err(|e| anyhow!("Failed to initialize logging: {e}")),
    }
}
