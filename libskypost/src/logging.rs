//! Logging setup for the skypost binary
//!
//! Nothing here runs at import time. The binary builds a [`LoggingConfig`]
//! and calls [`LoggingConfig::init`], which installs a `tracing` subscriber
//! for the current thread and hands back a guard; the subscriber stays active
//! until the guard is dropped at the end of `main`.
//!
//! # Examples
//!
//! ```no_run
//! use libskypost::logging::{LoggingConfig, LogFormat};
//!
//! let _guard = LoggingConfig::new(LogFormat::Json, "info".to_string(), false).init();
//!
//! // Or use defaults (respects SKYPOST_LOG_FORMAT / SKYPOST_LOG_LEVEL)
//! let _guard = LoggingConfig::from_env().init();
//! ```

use std::str::FromStr;

use tracing::dispatcher::{self, DefaultGuard, Dispatch};
use tracing_subscriber::EnvFilter;

/// Level used when neither the environment nor the caller picks one
pub const DEFAULT_LOG_LEVEL: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text output (no colors, for piping)
    Text,
    /// Machine-parseable JSON (one JSON object per line)
    Json,
    /// Pretty-printed with colors (for development)
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    pub verbose: bool,
}

impl LoggingConfig {
    /// Create a new logging configuration
    ///
    /// # Arguments
    ///
    /// * `format` - Log output format (text, json, or pretty)
    /// * `level` - Minimum log level (error, warn, info, debug, trace)
    /// * `verbose` - If true, forces debug level
    pub fn new(format: LogFormat, level: String, verbose: bool) -> Self {
        Self {
            format,
            level,
            verbose,
        }
    }

    /// Read `SKYPOST_LOG_FORMAT` and `SKYPOST_LOG_LEVEL`, falling back to
    /// text output at error level.
    pub fn from_env() -> Self {
        let format = std::env::var("SKYPOST_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(LogFormat::Text);

        let level =
            std::env::var("SKYPOST_LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

        Self::new(format, level, false)
    }

    /// The filter directive this configuration resolves to, before `RUST_LOG`
    pub fn effective_level(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.level
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.effective_level()))
    }

    /// Build the subscriber for this configuration without installing it
    pub fn dispatch(&self) -> Dispatch {
        let filter = self.filter();

        match self.format {
            LogFormat::Json => Dispatch::new(
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(true)
                    .flatten_event(true)
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .finish(),
            ),
            LogFormat::Pretty => Dispatch::new(
                tracing_subscriber::fmt()
                    .pretty()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .finish(),
            ),
            LogFormat::Text => Dispatch::new(
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_level(true)
                    .finish(),
            ),
        }
    }

    /// Install the subscriber for the current thread
    ///
    /// Logging stops when the returned guard is dropped.
    #[must_use = "logging is uninstalled when the guard is dropped"]
    pub fn init(&self) -> DefaultGuard {
        dispatcher::set_default(&self.dispatch())
    }
}
