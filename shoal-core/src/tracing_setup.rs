//! Tracing setup for Shoal
//!
//! Console output follows the level the operator asks for. A second layer
//! records everything from the gateway crates to `logs/shoal-last-run.log`
//! so a misbehaving stream can be diagnosed after the fact.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::ShoalError;

/// File name of the per-run debug log, overwritten on every start.
pub const LOG_FILE_NAME: &str = "shoal-last-run.log";

/// Directives for the file layer: full detail from our crates, info elsewhere.
const FILE_DIRECTIVES: &str = "info,shoal_core=trace,shoal_web=trace,shoal_sim=trace,shoal=trace";

/// Initialize tracing with dual output: console (user level) + file (full debug)
///
/// `RUST_LOG` overrides the console level when set. Returns the path of the
/// debug log file.
///
/// # Errors
/// - `ShoalError::Io` - Logs directory or log file could not be created
/// - `ShoalError::Configuration` - A global subscriber is already installed
pub fn init_tracing(console_level: Level, logs_dir: Option<&Path>) -> crate::Result<PathBuf> {
    let logs_path = logs_dir.unwrap_or_else(|| Path::new("logs"));
    create_dir_all(logs_path)?;

    let log_file_path = logs_path.join(LOG_FILE_NAME);
    let log_file = File::create(&log_file_path)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new(FILE_DIRECTIVES));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ShoalError::Configuration {
            reason: format!("tracing subscriber already installed: {e}"),
        })?;

    tracing::info!(
        console = %console_level,
        debug_file = %log_file_path.display(),
        "tracing initialized"
    );

    Ok(log_file_path)
}

/// CLI log levels for user control
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Informational, warning, and error messages
    #[default]
    Info,
    /// Debug, informational, warning, and error messages
    Debug,
    /// All messages including detailed tracing
    Trace,
}

impl CliLogLevel {
    /// Converts CLI log level to tracing Level enum.
    ///
    /// # Examples
    /// ```
    /// use shoal_core::tracing_setup::CliLogLevel;
    ///
    /// let level = CliLogLevel::Info.as_tracing_level();
    /// assert_eq!(level, tracing::Level::INFO);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::str::FromStr for CliLogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(CliLogLevel::Error),
            "warn" | "warning" => Ok(CliLogLevel::Warn),
            "info" => Ok(CliLogLevel::Info),
            "debug" => Ok(CliLogLevel::Debug),
            "trace" => Ok(CliLogLevel::Trace),
            _ => Err(format!("Invalid log level: {s}")),
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_tracing_level().as_str().to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(CliLogLevel::Debug.to_string(), "debug");
        assert_eq!("Trace".parse::<CliLogLevel>(), Ok(CliLogLevel::Trace));
        assert_eq!("WARNING".parse::<CliLogLevel>(), Ok(CliLogLevel::Warn));
        assert!("loud".parse::<CliLogLevel>().is_err());
    }
}
