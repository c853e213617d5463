//! Logging System
//!
//! Structured logging on top of `tracing`. Level, format and destination come
//! from [`LoggingConfig`], with `KVPUSH_LOG` taking precedence as a full
//! `EnvFilter` directive string.

use crate::error::UploadError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable holding an `EnvFilter` directive string.
pub const LOG_FILTER_ENV: &str = "KVPUSH_LOG";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Disable to install no subscriber at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr (default: stderr, keeping stdout for progress)
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable colored output (text format only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Install the global subscriber. Does nothing when logging is disabled.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), UploadError> {
    let default_config = LoggingConfig::default();
    let config = config.unwrap_or(&default_config);

    if !config.enabled {
        return Ok(());
    }

    let filter = build_env_filter(config)?;
    validate_format(&config.format)?;
    let writer = make_writer(&config.output)?;

    let base_subscriber = Registry::default().with(filter);

    let result = if config.format == "json" {
        base_subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init()
    } else {
        base_subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(config.color)
                    .with_writer(writer),
            )
            .try_init()
    };

    result.map_err(|e| UploadError::Settings(format!("Failed to initialize logging: {}", e)))
}

/// Build the filter from `KVPUSH_LOG`, or from the configured level plus module directives.
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, UploadError> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_FILTER_ENV) {
        return Ok(filter);
    }

    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(&config.level);
    for (module, module_level) in &config.modules {
        let directive = format!("{}={}", module, module_level);
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| UploadError::Settings(format!("Invalid log directive: {}", e)))?,
        );
    }

    Ok(filter)
}

fn validate_format(format: &str) -> Result<(), UploadError> {
    match format {
        "json" | "text" => Ok(()),
        other => Err(UploadError::Settings(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            other
        ))),
    }
}

fn make_writer(output: &str) -> Result<BoxMakeWriter, UploadError> {
    match output {
        "stdout" => Ok(BoxMakeWriter::new(std::io::stdout)),
        "stderr" => Ok(BoxMakeWriter::new(std::io::stderr)),
        other => Err(UploadError::Settings(format!(
            "Invalid log output: {} (must be 'stdout' or 'stderr')",
            other
        ))),
    }
}
