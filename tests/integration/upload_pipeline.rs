//! End-to-end tests for writing a mapping and running the whole pipeline

use crate::integration::test_utils::{namespace, upload_config, LogCapture, MemoryKvStore};
use kvpush::collector::{FileMapping, FileRecord};
use kvpush::error::{KvError, UploadError};
use kvpush::pipeline;
use kvpush::uploader::Uploader;
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn mapping(entries: &[(&str, &str)]) -> FileMapping {
    entries
        .iter()
        .map(|(key, content)| (key.to_string(), FileRecord::from_bytes(content.as_bytes())))
        .collect()
}

#[tokio::test]
async fn test_every_entry_is_written_as_json_record() {
    let store = MemoryKvStore::new();
    let files = mapping(&[("a.txt", "alpha"), ("dir/b.html", "<p>beta</p>")]);

    let written = Uploader::new(&store)
        .write_mapping("ns-1", &files)
        .await
        .unwrap();

    assert_eq!(written, 2);
    assert_eq!(store.keys("ns-1"), vec!["a.txt", "dir/b.html"]);

    let stored: serde_json::Value =
        serde_json::from_slice(&store.value("ns-1", "dir/b.html").unwrap()).unwrap();
    assert_eq!(stored["content"], "PHA+YmV0YTwvcD4=");
    assert_eq!(stored["contentType"], "text/html; charset=utf-8");

    let decoded: FileRecord = serde_json::from_slice(&store.value("ns-1", "a.txt").unwrap()).unwrap();
    assert_eq!(decoded.decode_content().unwrap(), b"alpha");
}

/// Three entries, the second write fails: the first stays written, the third is never tried.
#[tokio::test]
async fn test_first_write_failure_aborts_remaining_writes() {
    let store = MemoryKvStore::new().failing_write_at(2);
    let files = mapping(&[("1.txt", "one"), ("2.txt", "two"), ("3.txt", "three")]);

    let err = Uploader::new(&store)
        .write_mapping("ns-1", &files)
        .await
        .unwrap_err();

    match err {
        UploadError::Write { key, source } => {
            assert_eq!(key, "2.txt");
            assert!(matches!(source, KvError::RequestFailed { status: 500, .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.keys("ns-1"), vec!["1.txt"]);
    assert_eq!(store.write_attempts(), vec!["1.txt", "2.txt"]);
}

#[tokio::test]
async fn test_progress_names_each_key_before_writing() {
    let store = MemoryKvStore::new().failing_write_at(2);
    let files = mapping(&[("1.txt", "one"), ("2.txt", "two"), ("3.txt", "three")]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let _ = Uploader::new(&store)
        .with_progress(move |key| sink.lock().unwrap().push(key.to_string()))
        .write_mapping("ns-1", &files)
        .await;

    assert_eq!(*seen.lock().unwrap(), vec!["1.txt", "2.txt"]);
}

/// The per-key event stays below the default info level
#[tokio::test]
async fn test_per_key_upload_event_is_debug_level() {
    use tracing_subscriber::layer::SubscriberExt;

    let capture = LogCapture::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(capture.clone()));

    let store = MemoryKvStore::new();
    Uploader::new(&store)
        .write_mapping("ns-1", &mapping(&[("a.txt", "a"), ("b.txt", "b")]))
        .await
        .unwrap();

    assert_eq!(
        capture.levels_of("Uploading file"),
        vec![tracing::Level::DEBUG, tracing::Level::DEBUG]
    );
}

#[tokio::test]
async fn test_empty_mapping_writes_nothing() {
    let store = MemoryKvStore::new();

    let written = Uploader::new(&store)
        .write_mapping("ns-1", &FileMapping::new())
        .await
        .unwrap();

    assert_eq!(written, 0);
    assert!(store.write_attempts().is_empty());
}

#[tokio::test]
async fn test_pipeline_uploads_tree_into_created_namespace() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().to_path_buf();
    fs::create_dir_all(root.join("css")).unwrap();
    fs::write(root.join("index.html"), "<html><body></body></html>").unwrap();
    fs::write(root.join("css/site.css"), "body {}").unwrap();

    let store = MemoryKvStore::with_namespaces(vec![namespace("ns-old", "other")]);
    let config = upload_config(&root, "site");

    let report = pipeline::run(&config, &store, |_| {}).await.unwrap();

    assert!(report.created);
    assert_eq!(report.keys_written, 2);
    assert_eq!(report.namespace.title, "site");
    assert_eq!(
        store.keys(&report.namespace.id),
        vec!["css/site.css", "index.html"]
    );
    assert!(store.keys("ns-old").is_empty());
}

#[tokio::test]
async fn test_pipeline_reuses_existing_namespace() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().to_path_buf();
    fs::write(root.join("robots.txt"), "User-agent: *").unwrap();

    let store = MemoryKvStore::with_namespaces(vec![namespace("ns-site", "site")]);
    let config = upload_config(&root, "site");

    let report = pipeline::run(&config, &store, |_| {}).await.unwrap();

    assert!(!report.created);
    assert_eq!(report.namespace.id, "ns-site");
    assert_eq!(store.create_calls(), 0);
    assert_eq!(store.keys("ns-site"), vec!["robots.txt"]);
}

/// A bad root fails before any remote call is made
#[tokio::test]
async fn test_pipeline_missing_root_makes_no_remote_calls() {
    let temp_dir = TempDir::new().unwrap();
    let store = MemoryKvStore::new();
    let config = upload_config(&temp_dir.path().join("missing"), "site");

    let err = pipeline::run(&config, &store, |_| {}).await.unwrap_err();

    assert!(matches!(err, UploadError::PathNotFound { .. }));
    assert_eq!(store.create_calls(), 0);
    assert!(store.namespaces().is_empty());
    assert!(store.write_attempts().is_empty());
}

#[tokio::test]
async fn test_pipeline_resolution_failure_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
    let store = MemoryKvStore::new().failing_list();
    let config = upload_config(temp_dir.path(), "site");

    let err = pipeline::run(&config, &store, |_| {}).await.unwrap_err();

    assert!(matches!(err, UploadError::NamespaceResolution { .. }));
    assert!(store.write_attempts().is_empty());
}

#[test]
fn test_plan_collects_without_store() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
    let config = upload_config(temp_dir.path(), "site");

    let files = pipeline::plan(&config).unwrap();

    assert_eq!(files.keys().collect::<Vec<_>>(), vec!["a.txt"]);
}

/// Following symlinks is taken from the run configuration
#[cfg(unix)]
#[tokio::test]
async fn test_pipeline_follows_symlinked_directory_when_configured() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("site");
    let shared = temp_dir.path().join("shared");
    fs::create_dir_all(&root).unwrap();
    fs::create_dir_all(&shared).unwrap();
    fs::write(shared.join("fonts.css"), "@font-face {}").unwrap();
    fs::write(root.join("index.html"), "<html></html>").unwrap();
    std::os::unix::fs::symlink(&shared, root.join("assets")).unwrap();

    let store = MemoryKvStore::new();
    let mut config = upload_config(&root, "site");
    config.collector.follow_symlinks = true;

    let report = pipeline::run(&config, &store, |_| {}).await.unwrap();

    assert_eq!(report.keys_written, 2);
    assert_eq!(
        store.keys(&report.namespace.id),
        vec!["assets/fonts.css", "index.html"]
    );
}
