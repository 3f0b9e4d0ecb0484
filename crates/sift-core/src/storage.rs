//! Storage gateway abstraction for the conditioning pipeline.
//!
//! This module defines the storage contract the pipeline consumes. The shape
//! follows data-lake file semantics rather than single-shot blob puts:
//!
//! - `create` / `append` / `flush` is a **two-phase write**: staged data is
//!   not durable or visible to readers until `flush` returns
//! - `create` fails if the destination already exists (no silent overwrite)
//! - `delete` fails if the object is absent; callers that treat absence as
//!   success get idempotent retirement
//!
//! Every in-flight write is keyed by a run-scoped [`WriteHandle`] token, never
//! by a fixed shared scratch name, so concurrent runs for the same object name
//! cannot corrupt each other's staged bytes. The existence race between two
//! such runs is resolved at commit: the first `flush` wins and the loser gets
//! `Error::AlreadyExists`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use ulid::Ulid;

use crate::error::{Error, Result};

/// An open two-phase write, returned by [`StorageBackend::create`].
///
/// The handle identifies staged, not-yet-visible data. The token is unique per
/// `create` call, so two concurrent writers targeting the same path stage into
/// disjoint buffers.
#[derive(Debug, Clone)]
pub struct WriteHandle {
    path: String,
    token: String,
}

impl WriteHandle {
    /// Creates a handle for `path` with a freshly generated token.
    ///
    /// Backend implementations call this from `create`; the token is the
    /// backend's key for the staged data.
    #[must_use]
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            token: Ulid::new().to_string(),
        }
    }

    /// The destination path this handle will commit to.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The unique staging token for this write.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Object path (key).
    pub path: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Storage backend trait for the object namespace the pipeline operates on.
///
/// All backends (remote object stores, local filesystem, memory) implement
/// this trait. The contract is designed so that a crash or partial I/O failure
/// between `append` and `flush` leaves no visible object behind.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads an entire object.
    ///
    /// Returns `Error::NotFound` if the object doesn't exist. Staged writes
    /// that have not been flushed are not readable.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Begins a two-phase write to `path`.
    ///
    /// Returns `Error::AlreadyExists` if a committed object is already present
    /// at `path`. The returned handle owns an empty staging buffer; nothing is
    /// visible at `path` until [`flush`](Self::flush) succeeds.
    async fn create(&self, path: &str) -> Result<WriteHandle>;

    /// Stages `data` at `offset` within the handle's buffer.
    ///
    /// Offsets must be contiguous: `offset` must equal the number of bytes
    /// already staged, otherwise `Error::InvalidInput`. Returns
    /// `Error::NotFound` if the handle is unknown or already committed.
    async fn append(&self, handle: &WriteHandle, data: Bytes, offset: u64) -> Result<()>;

    /// Commits the staged write, making the object durable and visible.
    ///
    /// `length` must equal the total staged byte count, otherwise
    /// `Error::InvalidInput` and the staged data is discarded. Returns
    /// `Error::AlreadyExists` if another writer committed to the same path
    /// after this handle was created; the staged data is discarded and the
    /// existing object is left untouched.
    async fn flush(&self, handle: &WriteHandle, length: u64) -> Result<()>;

    /// Deletes an object.
    ///
    /// Returns `Error::NotFound` if the object doesn't exist. Callers that
    /// treat absence as success (retirement of an already-retired file) get
    /// idempotent behavior.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Gets object metadata without reading content.
    ///
    /// Returns `None` if the object doesn't exist. Staged, unflushed writes
    /// are invisible here as well.
    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>>;
}

/// In-memory storage backend for testing and embedding.
///
/// Thread-safe via `RwLock`. Committed objects and staged writes live in
/// separate maps; a staged write becomes an object only on `flush`, which is
/// where the create-new existence check is re-applied. Staged buffers of
/// abandoned handles persist until the process exits, mirroring the orphaned
/// scratch files a crashed remote writer leaves for garbage collection.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    staged: Arc<RwLock<HashMap<String, StagedWrite>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

#[derive(Debug)]
struct StagedWrite {
    path: String,
    buffer: Vec<u8>,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn objects_read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, StoredObject>>> {
        self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects_read()?;

        objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn create(&self, path: &str) -> Result<WriteHandle> {
        if self.objects_read()?.contains_key(path) {
            return Err(Error::AlreadyExists(path.to_string()));
        }

        let handle = WriteHandle::new(path);
        self.staged
            .write()
            .map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?
            .insert(
                handle.token().to_string(),
                StagedWrite {
                    path: path.to_string(),
                    buffer: Vec::new(),
                },
            );
        Ok(handle)
    }

    async fn append(&self, handle: &WriteHandle, data: Bytes, offset: u64) -> Result<()> {
        let mut staged = self.staged.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        let write = staged.get_mut(handle.token()).ok_or_else(|| {
            Error::NotFound(format!("no open write handle for {}", handle.path()))
        })?;

        let staged_len = write.buffer.len() as u64;
        if offset != staged_len {
            return Err(Error::InvalidInput(format!(
                "non-contiguous append to {}: offset {offset}, staged {staged_len}",
                write.path
            )));
        }
        write.buffer.extend_from_slice(&data);
        Ok(())
    }

    async fn flush(&self, handle: &WriteHandle, length: u64) -> Result<()> {
        // The staged entry is consumed regardless of outcome; a failed flush
        // discards the data rather than leaving a half-committed object.
        let write = self
            .staged
            .write()
            .map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?
            .remove(handle.token())
            .ok_or_else(|| {
                Error::NotFound(format!("no open write handle for {}", handle.path()))
            })?;

        let staged_len = write.buffer.len() as u64;
        if staged_len != length {
            return Err(Error::InvalidInput(format!(
                "flush length {length} disagrees with staged {staged_len} for {}",
                write.path
            )));
        }

        let mut objects = self.objects.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        if objects.contains_key(&write.path) {
            return Err(Error::AlreadyExists(write.path));
        }
        objects.insert(
            write.path,
            StoredObject {
                data: Bytes::from(write.buffer),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let removed = self
            .objects
            .write()
            .map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?
            .remove(path);

        match removed {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("object not found: {path}"))),
        }
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let objects = self.objects_read()?;

        Ok(objects.get(path).map(|obj| ObjectMeta {
            path: path.to_string(),
            size: obj.data.len() as u64,
            last_modified: Some(obj.last_modified),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn put(backend: &MemoryBackend, path: &str, data: &'static [u8]) {
        let handle = backend.create(path).await.expect("create");
        backend
            .append(&handle, Bytes::from_static(data), 0)
            .await
            .expect("append");
        backend
            .flush(&handle, data.len() as u64)
            .await
            .expect("flush");
    }

    #[tokio::test]
    async fn two_phase_write_roundtrip() {
        let backend = MemoryBackend::new();
        put(&backend, "test/file.txt", b"hello world").await;

        let retrieved = backend
            .get("test/file.txt")
            .await
            .expect("get should succeed");
        assert_eq!(retrieved, Bytes::from_static(b"hello world"));
    }

    #[tokio::test]
    async fn staged_data_invisible_before_flush() {
        let backend = MemoryBackend::new();
        let handle = backend.create("pending.bin").await.expect("create");
        backend
            .append(&handle, Bytes::from_static(b"partial"), 0)
            .await
            .expect("append");

        assert!(backend.get("pending.bin").await.is_err());
        assert!(backend.head("pending.bin").await.expect("head").is_none());

        backend.flush(&handle, 7).await.expect("flush");
        assert_eq!(
            backend.get("pending.bin").await.expect("get"),
            Bytes::from_static(b"partial")
        );
    }

    #[tokio::test]
    async fn create_rejects_existing_object() {
        let backend = MemoryBackend::new();
        put(&backend, "taken.txt", b"first").await;

        let result = backend.create("taken.txt").await;
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn concurrent_writers_race_resolved_at_flush() {
        let backend = MemoryBackend::new();

        // Both creates succeed: nothing is visible yet.
        let first = backend.create("contended.txt").await.expect("create");
        let second = backend.create("contended.txt").await.expect("create");

        backend
            .append(&first, Bytes::from_static(b"winner"), 0)
            .await
            .expect("append");
        backend.flush(&first, 6).await.expect("flush");

        backend
            .append(&second, Bytes::from_static(b"loser!"), 0)
            .await
            .expect("append");
        let result = backend.flush(&second, 6).await;
        assert!(matches!(result, Err(Error::AlreadyExists(_))));

        // The winner's bytes survive intact.
        assert_eq!(
            backend.get("contended.txt").await.expect("get"),
            Bytes::from_static(b"winner")
        );
    }

    #[tokio::test]
    async fn append_requires_contiguous_offset() {
        let backend = MemoryBackend::new();
        let handle = backend.create("gap.bin").await.expect("create");

        backend
            .append(&handle, Bytes::from_static(b"abc"), 0)
            .await
            .expect("append");
        let result = backend.append(&handle, Bytes::from_static(b"def"), 7).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn flush_rejects_length_mismatch() {
        let backend = MemoryBackend::new();
        let handle = backend.create("short.bin").await.expect("create");
        backend
            .append(&handle, Bytes::from_static(b"abc"), 0)
            .await
            .expect("append");

        let result = backend.flush(&handle, 99).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        // The staged data was discarded; nothing became visible.
        assert!(backend.head("short.bin").await.expect("head").is_none());
    }

    #[tokio::test]
    async fn append_after_flush_fails() {
        let backend = MemoryBackend::new();
        let handle = backend.create("done.bin").await.expect("create");
        backend
            .append(&handle, Bytes::from_static(b"xy"), 0)
            .await
            .expect("append");
        backend.flush(&handle, 2).await.expect("flush");

        let result = backend.append(&handle, Bytes::from_static(b"z"), 2).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_absent_object_is_not_found() {
        let backend = MemoryBackend::new();
        let result = backend.delete("missing.txt").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_then_head_is_none() {
        let backend = MemoryBackend::new();
        put(&backend, "del.txt", b"data").await;
        assert!(backend.head("del.txt").await.unwrap().is_some());

        backend.delete("del.txt").await.expect("delete");
        assert!(backend.head("del.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn head_reports_size_and_mtime() {
        let backend = MemoryBackend::new();
        put(&backend, "meta.txt", b"data").await;

        let meta = backend
            .head("meta.txt")
            .await
            .expect("head")
            .expect("object should exist");
        assert_eq!(meta.path, "meta.txt");
        assert_eq!(meta.size, 4);
        assert!(meta.last_modified.is_some(), "must have last_modified");
    }
}
