//! Logging bootstrap
//!
//! Installs a `tracing` subscriber configured from [`LoggingConfig`]

use crate::error::{BrandConnectError, BrandConnectResult, ErrorContext};
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty, compact)
    pub format: LogFormat,
    /// Whether to include file and line information
    pub include_location: bool,
    /// Whether to include thread information
    pub include_thread: bool,
    /// Whether to log to file
    pub log_to_file: bool,
    /// Log file path (if log_to_file is true)
    pub log_file_path: Option<String>,
    /// Custom filter directives
    pub filter_directives: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_location: true,
            include_thread: false,
            log_to_file: false,
            log_file_path: None,
            filter_directives: vec![
                "brandconnect_core=debug".to_string(),
                "brandconnect_client=debug".to_string(),
            ],
        }
    }
}

fn logging_error(message: String) -> BrandConnectError {
    BrandConnectError::Config {
        message,
        source: None,
        context: ErrorContext::new("logging").with_operation("init_logging"),
    }
}

/// Initialize the logging system.
///
/// `RUST_LOG` takes precedence over `config.level` when it is set. Fails if a
/// global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> BrandConnectResult<()> {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    for directive in &config.filter_directives {
        let directive = directive
            .parse()
            .map_err(|e| {
                logging_error(format!("Invalid filter directive '{}': {}", directive, e))
            })?;
        filter = filter.add_directive(directive);
    }

    let writer = if config.log_to_file {
        let log_path = config.log_file_path.as_ref().ok_or_else(|| {
            logging_error("log_file_path must be specified when log_to_file is true".to_string())
        })?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;
        fmt::writer::BoxMakeWriter::new(Mutex::new(file))
    } else {
        fmt::writer::BoxMakeWriter::new(io::stdout)
    };

    let base = fmt::layer()
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread)
        .with_thread_names(config.include_thread)
        .with_writer(writer);

    let fmt_layer = match config.format {
        LogFormat::Json => base.json().boxed(),
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Compact => base.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| logging_error(format!("Failed to install subscriber: {}", e)))
}
