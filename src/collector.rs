//! Tree collector
//!
//! Walks a root directory and turns every non-directory entry into a
//! [`FileRecord`], keyed by its path relative to the root.

use crate::error::UploadError;
use crate::sniff::detect_content_type;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

/// Encoded file as stored in the KV namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Base64 (standard alphabet, padded) of the raw file bytes
    pub content: String,
    /// Sniffed MIME type
    pub content_type: String,
}

impl FileRecord {
    /// Encode raw file bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            content: BASE64_STANDARD.encode(bytes),
            content_type: detect_content_type(bytes).to_string(),
        }
    }

    /// Decode the stored content back to raw bytes.
    pub fn decode_content(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(&self.content)
    }
}

/// Relative path -> encoded file. Sorted, so iteration order is reproducible.
pub type FileMapping = BTreeMap<String, FileRecord>;

/// Collector configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Whether to descend into symlinked directories (default: false)
    #[serde(default)]
    pub follow_symlinks: bool,
}

/// Builds a [`FileMapping`] from a directory tree
pub struct Collector {
    root: PathBuf,
    config: CollectorConfig,
}

impl Collector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            config: CollectorConfig::default(),
        }
    }

    pub fn with_config(root: impl Into<PathBuf>, config: CollectorConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Walk the tree and encode every file.
    ///
    /// Fails with [`UploadError::PathNotFound`] when the root does not exist,
    /// before any traversal happens. The first unreadable file aborts the walk.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn collect(&self) -> Result<FileMapping, UploadError> {
        let start = Instant::now();

        std::fs::metadata(&self.root).map_err(|source| UploadError::PathNotFound {
            path: self.root.clone(),
            source,
        })?;

        let mut files = FileMapping::new();
        let mut total_bytes: u64 = 0;

        let walker = WalkDir::new(&self.root).follow_links(self.config.follow_symlinks);

        for entry in walker {
            let entry = entry.map_err(|source| UploadError::Walk {
                path: source
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.root.clone()),
                source,
            })?;

            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            let key = relative_key(&self.root, path)?;
            let bytes = std::fs::read(path).map_err(|source| UploadError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            total_bytes += bytes.len() as u64;

            let record = FileRecord::from_bytes(&bytes);
            debug!(
                key = %key,
                size = bytes.len(),
                content_type = %record.content_type,
                "Collected file"
            );

            // A repeated key replaces the earlier record.
            files.insert(key, record);
        }

        info!(
            file_count = files.len(),
            total_bytes,
            duration_ms = start.elapsed().as_millis() as u64,
            "Collected directory tree"
        );

        Ok(files)
    }
}

/// Derive the mapping key for `path` under `root`.
///
/// The root is stripped component-wise, so `/data` is not a prefix of
/// `/database/x`. A path outside the root, or the root itself when it is a
/// file, keeps its full path as key. Names that are not valid UTF-8 fail with
/// [`UploadError::InvalidKey`] rather than being rewritten.
pub fn relative_key(root: &Path, path: &Path) -> Result<String, UploadError> {
    let relative = match path.strip_prefix(root) {
        Ok(rest) if !rest.as_os_str().is_empty() => rest,
        _ => path,
    };

    relative
        .to_str()
        .map(str::to_string)
        .ok_or_else(|| UploadError::InvalidKey {
            path: path.to_path_buf(),
        })
}
