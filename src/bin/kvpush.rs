//! kvpush CLI Binary
//!
//! Reads the required environment, then uploads the target directory into the
//! configured Workers KV namespace.

use anyhow::Context;
use clap::Parser;
use kvpush::cli::Cli;
use kvpush::collector::CollectorConfig;
use kvpush::config::{Settings, UploadConfig};
use kvpush::kv::CloudflareKvClient;
use kvpush::logging::{init_logging, LoggingConfig};
use kvpush::pipeline;
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let logging_config = build_logging_config(&cli, &settings);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("{}", e);
        process::exit(1);
    }

    info!("kvpush starting");

    match run(&cli, &settings) {
        Ok(message) => {
            info!("Run completed successfully");
            println!("{}", message);
        }
        Err(e) => {
            eprintln!("{}", report_failure(&e));
            process::exit(1);
        }
    }
}

/// Log a short failure event and return the full error chain for stderr.
fn report_failure(e: &anyhow::Error) -> String {
    error!("Run failed");
    format!("{:#}", e)
}

fn run(cli: &Cli, settings: &Settings) -> anyhow::Result<String> {
    let mut config = UploadConfig::from_env()?;
    config.collector = build_collector_config(cli, settings);

    if cli.dry_run {
        let files = pipeline::plan(&config).context("error walking the path")?;
        for (key, record) in &files {
            println!("{}\t{}\t{}", key, record.content_type, record.content.len());
        }
        return Ok(format!("{} files would be written", files.len()));
    }

    let client = CloudflareKvClient::new(&config.credentials, &settings.api)
        .context("error initializing KV client")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("error starting runtime")?;

    runtime.block_on(pipeline::run(&config, &client, |key| {
        println!("Uploading file {}", key);
    }))?;

    Ok("All values written to WorkersKV successfully".to_string())
}

/// `--follow-symlinks` turns following on; it cannot turn off a settings file value.
fn build_collector_config(cli: &Cli, settings: &Settings) -> CollectorConfig {
    let mut config = settings.collector.clone();
    if cli.follow_symlinks {
        config.follow_symlinks = true;
    }
    config
}

/// Precedence: CLI flags override the settings file, which overrides defaults.
fn build_logging_config(cli: &Cli, settings: &Settings) -> LoggingConfig {
    let mut config = settings.logging.clone();

    if cli.quiet {
        config.enabled = false;
    }
    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }

    config
}
