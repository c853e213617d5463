//! kvpush: Directory Upload to Workers KV
//!
//! Walks a local directory, encodes every file as base64 content plus a sniffed
//! content type, and writes each one into a Workers KV namespace keyed by its
//! path relative to the root.

pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod kv;
pub mod logging;
pub mod pipeline;
pub mod sniff;
pub mod uploader;
