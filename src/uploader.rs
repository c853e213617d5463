//! Namespace resolver and writer
//!
//! Finds (or creates) the target namespace by title, then writes every entry
//! of a [`FileMapping`] into it, one remote write per key. The first failure
//! aborts the run; keys written before it stay written.

use crate::collector::FileMapping;
use crate::error::UploadError;
use crate::kv::{KvStore, Namespace};
use tracing::{debug, info, instrument, warn};

/// Outcome of [`Uploader::find_or_create_namespace`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNamespace {
    pub namespace: Namespace,
    /// True when no namespace with the title existed and one was created
    pub created: bool,
}

type ProgressFn = Box<dyn Fn(&str) + Send + Sync>;

pub struct Uploader<'a, S: KvStore + ?Sized> {
    store: &'a S,
    progress: Option<ProgressFn>,
}

impl<'a, S: KvStore + ?Sized> Uploader<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            progress: None,
        }
    }

    /// Call `progress` with each key right before it is written.
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Look the namespace up by exact title, creating it when absent.
    ///
    /// When several namespaces share the title, the last one in listing order
    /// is used.
    #[instrument(skip(self))]
    pub async fn find_or_create_namespace(
        &self,
        title: &str,
    ) -> Result<ResolvedNamespace, UploadError> {
        let namespaces = self.store.list_namespaces().await.map_err(|source| {
            UploadError::NamespaceResolution {
                title: title.to_string(),
                source,
            }
        })?;

        let matches: Vec<&Namespace> = namespaces.iter().filter(|ns| ns.title == title).collect();
        if matches.len() > 1 {
            warn!(
                count = matches.len(),
                "Several namespaces share this title, using the last one listed"
            );
        }

        if let Some(existing) = matches.last() {
            info!(namespace_id = %existing.id, "Found namespace");
            return Ok(ResolvedNamespace {
                namespace: (*existing).clone(),
                created: false,
            });
        }

        info!("Namespace not found, creating");
        let namespace = self.store.create_namespace(title).await.map_err(|source| {
            UploadError::NamespaceResolution {
                title: title.to_string(),
                source,
            }
        })?;
        info!(namespace_id = %namespace.id, "Created namespace");

        Ok(ResolvedNamespace {
            namespace,
            created: true,
        })
    }

    /// Write every mapping entry under `namespace_id`, in mapping order.
    ///
    /// Returns the number of keys written.
    #[instrument(skip(self, files), fields(file_count = files.len()))]
    pub async fn write_mapping(
        &self,
        namespace_id: &str,
        files: &FileMapping,
    ) -> Result<usize, UploadError> {
        let mut written = 0;

        for (key, record) in files {
            let payload = serde_json::to_vec(record).map_err(|source| UploadError::Serialize {
                key: key.clone(),
                source,
            })?;

            debug!(key = %key, "Uploading file");
            if let Some(progress) = &self.progress {
                progress(key.as_str());
            }

            self.store
                .write_value(namespace_id, key, payload)
                .await
                .map_err(|source| UploadError::Write {
                    key: key.clone(),
                    source,
                })?;
            written += 1;
        }

        info!(keys_written = written, "All values written");
        Ok(written)
    }
}
