//! Integration tests for the kvpush upload pipeline

mod upload_pipeline;
