//! Logging setup: env filter, stdout (plain or JSON) and an optional daily file

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::LaunchError;

/// Verbosity of launchpad's own log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Filter used when `RUST_LOG` is unset. Dependencies stay at `warn`
    /// unless the level is stricter.
    pub fn directive(&self) -> String {
        let deps = match self {
            LogLevel::Error => "error",
            _ => "warn",
        };
        format!(
            "{deps},launchpad={level},tower_http={level}",
            deps = deps,
            level = self.as_str()
        )
    }
}

impl FromStr for LogLevel {
    type Err = LaunchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.trim().to_ascii_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            other => {
                return Err(LaunchError::ConfigError(format!(
                    "Unknown log level '{}'",
                    other
                )))
            }
        };
        Ok(level)
    }
}

/// Logging options
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Log level
    pub log_level: LogLevel,

    /// Write logs to stdout
    pub stdout: bool,

    /// Log directory for daily rolling file output
    pub log_dir: Option<PathBuf>,

    /// Enable JSON format
    pub json_format: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            stdout: true,
            log_dir: None,
            json_format: false,
        }
    }
}

/// Initialize logging
///
/// The returned guard flushes the file writer on drop and must be kept alive
/// for as long as file logging is wanted.
pub fn init_logging(options: LogOptions) -> Result<Option<WorkerGuard>, LaunchError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.log_level.directive()));

    let (file_layer, guard) = match &options.log_dir {
        Some(dir) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("launchpad.log")
                .build(dir)
                .map_err(|e| LaunchError::ConfigError(format!("log directory {}: {}", dir.display(), e)))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(file_layer);

    if options.stdout && options.json_format {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| LaunchError::ConfigError(e.to_string()))?;
    } else if options.stdout {
        subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| LaunchError::ConfigError(e.to_string()))?;
    } else {
        subscriber
            .try_init()
            .map_err(|e| LaunchError::ConfigError(e.to_string()))?;
    }

    Ok(guard)
}
