//! Local-filesystem storage backend.
//!
//! Implements the [`StorageBackend`] contract over a directory root. The
//! two-phase write maps onto the filesystem as write-then-link:
//!
//! - `create` opens a token-named staging file next to the destination
//!   (`name.<token>.staging`), so concurrent writers never share a scratch file
//! - `append` extends the staging file, enforcing contiguous offsets
//! - `flush` fsyncs the staging file and links it into place with create-new
//!   semantics, making the object visible atomically
//!
//! A crash before `flush` leaves only a `.staging` orphan behind; the
//! destination name never holds a partial object. Orphans are left for an
//! out-of-band sweep, the same way a remote writer's abandoned upload parts
//! are left for garbage collection.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::storage::{ObjectMeta, StorageBackend, WriteHandle};

/// Storage backend rooted at a local directory.
///
/// Object paths are forward-slash relative paths beneath the root. Intended
/// for development and single-node deployments; the pipeline itself only sees
/// the [`StorageBackend`] contract.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Creates a backend rooted at `root`. The directory does not need to
    /// exist yet; it is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Validates a relative object path and resolves it beneath the root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        if path.is_empty() {
            return Err(Error::InvalidInput("empty object path".to_string()));
        }
        if path.starts_with('/') || path.contains('\\') {
            return Err(Error::InvalidInput(format!(
                "object paths must be forward-slash relative: {path}"
            )));
        }
        if path.contains('\n') || path.contains('\r') || path.contains('\0') {
            return Err(Error::InvalidInput(format!(
                "control characters not allowed in paths: {path}"
            )));
        }
        for segment in path.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(Error::InvalidInput(format!(
                    "path traversal not allowed: {path}"
                )));
            }
        }
        Ok(self.root.join(path))
    }

    /// The staging sibling for a handle's destination.
    fn staging_path(&self, handle: &WriteHandle) -> Result<PathBuf> {
        let dest = self.resolve(handle.path())?;
        let file_name = dest
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidInput(format!("bad object path: {}", handle.path())))?;
        Ok(dest.with_file_name(format!("{file_name}.{}.staging", handle.token())))
    }
}

fn map_io(context: &str, path: &Path, err: std::io::Error) -> Error {
    match err.kind() {
        ErrorKind::NotFound => Error::NotFound(format!("{}", path.display())),
        ErrorKind::AlreadyExists => Error::AlreadyExists(format!("{}", path.display())),
        _ => Error::transient_with_source(format!("{context} failed for {}", path.display()), err),
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let abs = self.resolve(path)?;
        let data = fs::read(&abs)
            .await
            .map_err(|e| map_io("read", &abs, e))?;
        Ok(Bytes::from(data))
    }

    async fn create(&self, path: &str) -> Result<WriteHandle> {
        let dest = self.resolve(path)?;
        if fs::try_exists(&dest)
            .await
            .map_err(|e| map_io("stat", &dest, e))?
        {
            return Err(Error::AlreadyExists(path.to_string()));
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io("mkdir", parent, e))?;
        }

        let handle = WriteHandle::new(path);
        let staging = self.staging_path(&handle)?;
        OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&staging)
            .await
            .map_err(|e| map_io("create staging", &staging, e))?;
        Ok(handle)
    }

    async fn append(&self, handle: &WriteHandle, data: Bytes, offset: u64) -> Result<()> {
        let staging = self.staging_path(handle)?;
        let staged_len = match fs::metadata(&staging).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(format!(
                    "no open write handle for {}",
                    handle.path()
                )));
            }
            Err(e) => return Err(map_io("stat staging", &staging, e)),
        };

        if offset != staged_len {
            return Err(Error::InvalidInput(format!(
                "non-contiguous append to {}: offset {offset}, staged {staged_len}",
                handle.path()
            )));
        }

        let mut file = OpenOptions::new()
            .append(true)
            .open(&staging)
            .await
            .map_err(|e| map_io("open staging", &staging, e))?;
        file.write_all(&data)
            .await
            .map_err(|e| map_io("append", &staging, e))?;
        file.flush()
            .await
            .map_err(|e| map_io("append", &staging, e))?;
        Ok(())
    }

    async fn flush(&self, handle: &WriteHandle, length: u64) -> Result<()> {
        let staging = self.staging_path(handle)?;
        let dest = self.resolve(handle.path())?;

        let staged_len = match fs::metadata(&staging).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(format!(
                    "no open write handle for {}",
                    handle.path()
                )));
            }
            Err(e) => return Err(map_io("stat staging", &staging, e)),
        };
        if staged_len != length {
            let _ = fs::remove_file(&staging).await;
            return Err(Error::InvalidInput(format!(
                "flush length {length} disagrees with staged {staged_len} for {}",
                handle.path()
            )));
        }

        let file = fs::File::open(&staging)
            .await
            .map_err(|e| map_io("open staging", &staging, e))?;
        file.sync_all()
            .await
            .map_err(|e| map_io("sync staging", &staging, e))?;
        drop(file);

        // hard_link fails with AlreadyExists if another writer committed
        // first, which keeps the create-new contract honest at commit time.
        match fs::hard_link(&staging, &dest).await {
            Ok(()) => {
                fs::remove_file(&staging)
                    .await
                    .map_err(|e| map_io("remove staging", &staging, e))?;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let _ = fs::remove_file(&staging).await;
                Err(Error::AlreadyExists(handle.path().to_string()))
            }
            Err(e) => Err(map_io("commit", &dest, e)),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let abs = self.resolve(path)?;
        fs::remove_file(&abs)
            .await
            .map_err(|e| map_io("delete", &abs, e))
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let abs = self.resolve(path)?;
        match fs::metadata(&abs).await {
            Ok(meta) if meta.is_file() => {
                let last_modified = meta.modified().ok().map(DateTime::<Utc>::from);
                Ok(Some(ObjectMeta {
                    path: path.to_string(),
                    size: meta.len(),
                    last_modified,
                }))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(map_io("stat", &abs, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> (tempfile::TempDir, LocalBackend) {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = LocalBackend::new(dir.path());
        (dir, backend)
    }

    async fn put(backend: &LocalBackend, path: &str, data: &'static [u8]) {
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
    async fn roundtrip_through_nested_path() {
        let (_dir, backend) = backend();
        put(&backend, "demo-metrics/raw/m.parquet", b"payload").await;

        let data = backend.get("demo-metrics/raw/m.parquet").await.expect("get");
        assert_eq!(data, Bytes::from_static(b"payload"));
    }

    #[tokio::test]
    async fn destination_invisible_until_flush() {
        let (_dir, backend) = backend();
        let handle = backend.create("a/pending.bin").await.expect("create");
        backend
            .append(&handle, Bytes::from_static(b"half"), 0)
            .await
            .expect("append");

        assert!(backend.head("a/pending.bin").await.expect("head").is_none());

        backend.flush(&handle, 4).await.expect("flush");
        assert!(backend.head("a/pending.bin").await.expect("head").is_some());
    }

    #[tokio::test]
    async fn create_rejects_existing_file() {
        let (_dir, backend) = backend();
        put(&backend, "taken.bin", b"x").await;

        let result = backend.create("taken.bin").await;
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn commit_race_loser_gets_already_exists() {
        let (_dir, backend) = backend();

        let first = backend.create("race.bin").await.expect("create");
        let second = backend.create("race.bin").await.expect("create");

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

        assert_eq!(
            backend.get("race.bin").await.expect("get"),
            Bytes::from_static(b"winner")
        );
    }

    #[tokio::test]
    async fn multi_append_is_contiguous() {
        let (_dir, backend) = backend();
        let handle = backend.create("parts.bin").await.expect("create");

        backend
            .append(&handle, Bytes::from_static(b"abc"), 0)
            .await
            .expect("append");
        backend
            .append(&handle, Bytes::from_static(b"def"), 3)
            .await
            .expect("append");
        assert!(backend
            .append(&handle, Bytes::from_static(b"ghi"), 4)
            .await
            .is_err());

        backend.flush(&handle, 6).await.expect("flush");
        assert_eq!(
            backend.get("parts.bin").await.expect("get"),
            Bytes::from_static(b"abcdef")
        );
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let (_dir, backend) = backend();
        let result = backend.delete("missing.bin").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let (_dir, backend) = backend();
        assert!(backend.get("../outside.bin").await.is_err());
        assert!(backend.get("/absolute.bin").await.is_err());
        assert!(backend.get("a/./b.bin").await.is_err());
    }
}
