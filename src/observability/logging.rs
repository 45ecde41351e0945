//! # Logging
//!
//! Installs the process-wide `tracing` subscriber.
//!
//! `RUST_LOG` takes precedence. Without it the filter is built from the configured
//! level, scoped to this crate. Output is either human readable text or one JSON
//! object per line.

use crate::config::LoggingConfig;
use anyhow::{anyhow, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Parse a configured format, falling back to text for unknown values
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Handle for the installed subscriber, kept alive for the whole process
#[derive(Debug)]
pub struct Telemetry {
    format: LogFormat,
    filter: String,
}

impl Telemetry {
    /// Install the global subscriber
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber was already installed.
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let format = LogFormat::parse(&config.format);
        let default_filter = default_filter(&config.level);
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.as_str().into());
        let filter = env_filter.to_string();

        let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
        let installed = match format {
            LogFormat::Json => builder.json().with_current_span(true).try_init(),
            LogFormat::Text => builder.with_ansi(config.enable_color).try_init(),
        };
        installed.map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))?;

        info!(format = ?format, filter = %filter, "logging initialized");
        Ok(Self { format, filter })
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Mark the end of the process's logging
    pub fn shutdown(self) {
        info!("shutting down");
    }
}

/// Filter directive used when `RUST_LOG` is unset
pub fn default_filter(level: &str) -> String {
    let level = match level.trim().to_ascii_lowercase().as_str() {
        level @ ("error" | "warn" | "info" | "debug" | "trace") => level.to_string(),
        _ => "info".to_string(),
    };
    format!("node_perf_evaluator={level},tower_http=warn")
}
