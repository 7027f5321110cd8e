//! Persistence collaborators for encoded record streams.
//!
//! The codec never performs I/O. A [`RecordSink`] takes a finished
//! [`RecordStream`] and stores it under a caller-chosen key, returning the
//! location it can later be fetched from (the training job reads from there).

use bytes::Bytes;
use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use crate::record::RecordStream;

/// Errors raised by a sink.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The key is empty or escapes the sink's namespace.
    #[error("Invalid object key: {0:?}")]
    InvalidKey(String),

    /// The storage backend failed.
    #[error("I/O error writing {path}: {source}")]
    Io {
        /// Target path.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
}

/// Storage for finished record streams.
pub trait RecordSink {
    /// Stores `stream` under `key` and returns its location URI.
    fn put(&mut self, key: &str, stream: &RecordStream) -> Result<String, SinkError>;
}

fn check_key(key: &str) -> Result<(), SinkError> {
    let path = Path::new(key);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if key.is_empty() || escapes {
        return Err(SinkError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// In-memory sink, for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    objects: BTreeMap<String, Bytes>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Bytes> {
        self.objects.get(key)
    }

    /// Stored keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if nothing was stored.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl RecordSink for MemorySink {
    fn put(&mut self, key: &str, stream: &RecordStream) -> Result<String, SinkError> {
        check_key(key)?;
        self.objects
            .insert(key.to_string(), stream.clone().into_bytes());
        Ok(format!("mem://{key}"))
    }
}

/// Sink writing objects to `<root>/<bucket>/<prefix>/<key>` on local disk.
///
/// The layout mirrors an object store bucket so that a directory can stand in
/// for remote storage.
#[derive(Debug, Clone)]
pub struct LocalDirSink {
    root: PathBuf,
    bucket: String,
    prefix: String,
}

impl LocalDirSink {
    /// Creates a sink rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Where `key` is stored on disk.
    pub fn object_path(&self, key: &str) -> PathBuf {
        let mut path = self.root.join(&self.bucket);
        for part in self.prefix.split('/').filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path.join(key)
    }
}

impl RecordSink for LocalDirSink {
    fn put(&mut self, key: &str, stream: &RecordStream) -> Result<String, SinkError> {
        check_key(key)?;
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SinkError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&path, stream.as_bytes()).map_err(|source| SinkError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::info!(
            path = %path.display(),
            records = stream.len(),
            bytes = stream.byte_len(),
            "Stored record stream"
        );
        Ok(format!("file://{}", path.display()))
    }
}
