//! CLI parse: clap types for kvpush. No behavior; definitions only.
//!
//! The upload target, credentials and namespace are not flags; they come from
//! the required environment variables (see [`crate::config::REQUIRED_ENV_VARS`]).

use clap::Parser;
use std::path::PathBuf;

/// kvpush - upload a directory tree into a Workers KV namespace
#[derive(Parser, Debug)]
#[command(name = "kvpush")]
#[command(about = "Upload a directory tree into a Workers KV namespace")]
#[command(
    after_help = "Required environment: CF_API_KEY, CF_API_EMAIL, TARGET_DIRECTORY, CF_API_ACCOUNT_ID, CF_KV_NAMESPACE"
)]
pub struct Cli {
    /// Settings file (TOML) for API endpoint and logging
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Walk the tree and list the keys without contacting the KV API
    #[arg(long)]
    pub dry_run: bool,

    /// Descend into symlinked directories under the target directory
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Enable verbose logging
    #[arg(long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Disable logging
    #[arg(long)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,
}
