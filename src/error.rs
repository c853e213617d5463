//! Error types for the kvpush upload pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`KvStore`](crate::kv::KvStore) implementation.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),
}

/// Pipeline errors. Every variant is terminal for the run.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("missing required env vars\n{}", format_missing(.names))]
    MissingConfig { names: Vec<String> },

    #[error("env vars are set but not valid unicode: {}", .names.join(", "))]
    NonUnicodeConfig { names: Vec<String> },

    #[error("path not found: {}: {source}", .path.display())]
    PathNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error walking {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("error while reading file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file path is not valid UTF-8 and cannot be used as a key: {}", .path.display())]
    InvalidKey { path: PathBuf },

    #[error("error marshaling file definition for {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("error while finding or creating namespace '{title}': {source}")]
    NamespaceResolution {
        title: String,
        #[source]
        source: KvError,
    },

    #[error("error while writing key '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: KvError,
    },

    #[error("Settings error: {0}")]
    Settings(String),
}

fn format_missing(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("{} not found", name))
        .collect::<Vec<_>>()
        .join("\n")
}

impl From<config::ConfigError> for UploadError {
    fn from(err: config::ConfigError) -> Self {
        UploadError::Settings(err.to_string())
    }
}
