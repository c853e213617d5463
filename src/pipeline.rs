//! Upload pipeline: collect the tree, resolve the namespace, write every key.

use crate::collector::{Collector, FileMapping};
use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::kv::{KvStore, Namespace};
use crate::uploader::Uploader;
use std::time::Instant;
use tracing::{info, instrument};

/// Summary of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub namespace: Namespace,
    /// Whether the namespace was created by this run
    pub created: bool,
    pub keys_written: usize,
}

/// Collect the configured directory without touching the remote store.
pub fn plan(config: &UploadConfig) -> Result<FileMapping, UploadError> {
    Collector::with_config(config.target_directory.clone(), config.collector.clone()).collect()
}

/// Run the whole upload. The tree is fully collected before the first remote call.
#[instrument(skip_all, fields(namespace = %config.namespace))]
pub async fn run<S, F>(
    config: &UploadConfig,
    store: &S,
    progress: F,
) -> Result<UploadReport, UploadError>
where
    S: KvStore + ?Sized,
    F: Fn(&str) + Send + Sync + 'static,
{
    let start = Instant::now();

    let files = plan(config)?;

    let uploader = Uploader::new(store).with_progress(progress);
    let resolved = uploader.find_or_create_namespace(&config.namespace).await?;
    let keys_written = uploader
        .write_mapping(&resolved.namespace.id, &files)
        .await?;

    info!(
        keys_written,
        created = resolved.created,
        duration_ms = start.elapsed().as_millis() as u64,
        "Upload complete"
    );

    Ok(UploadReport {
        namespace: resolved.namespace,
        created: resolved.created,
        keys_written,
    })
}
