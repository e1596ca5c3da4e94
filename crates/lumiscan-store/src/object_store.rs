//! Object-storage abstraction and implementations.
//!
//! [`ObjectStore`] is the minimal put/delete capability the pipeline needs
//! for its internal image copies. [`MemoryObjectStore`] backs tests and
//! embedded use; [`FsObjectStore`] persists objects under a root directory
//! using [`tokio::fs`], creating parent directories on write.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use lumiscan_types::{LumiscanError, Result};

/// A fallible put/delete capability over keyed binary objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`, returning the object's location.
    async fn put(&self, bytes: &[u8], key: &str) -> Result<String>;

    /// Delete the object at `location`. Returns whether it existed.
    async fn delete(&self, location: &str) -> Result<bool>;
}

/// In-memory object store keyed by location.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored object (test helper).
    pub async fn get(&self, location: &str) -> Option<Vec<u8>> {
        self.objects.lock().await.get(location).cloned()
    }

    /// Number of stored objects (test helper).
    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, bytes: &[u8], key: &str) -> Result<String> {
        let location = format!("mem://{key}");
        self.objects
            .lock()
            .await
            .insert(location.clone(), bytes.to_vec());
        debug!(key, bytes = bytes.len(), "stored object in memory");
        Ok(location)
    }

    async fn delete(&self, location: &str) -> Result<bool> {
        Ok(self.objects.lock().await.remove(location).is_some())
    }
}

/// Filesystem-backed object store rooted at a directory.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, bytes: &[u8], key: &str) -> Result<String> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "stored object on disk");
        Ok(path.display().to_string())
    }

    async fn delete(&self, location: &str) -> Result<bool> {
        match tokio::fs::remove_file(location).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(LumiscanError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_put_get_delete() {
        let store = MemoryObjectStore::new();
        let location = store.put(b"bytes", "a/b/original.jpg").await.unwrap();
        assert_eq!(location, "mem://a/b/original.jpg");
        assert_eq!(store.get(&location).await.unwrap(), b"bytes");
        assert_eq!(store.len().await, 1);

        assert!(store.delete(&location).await.unwrap());
        assert!(!store.delete(&location).await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn fs_put_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        let location = store
            .put(b"jpeg-bytes", "skin-analysis/user-1/rec-1/original.jpg")
            .await
            .unwrap();
        let on_disk = tokio::fs::read(&location).await.unwrap();
        assert_eq!(on_disk, b"jpeg-bytes");
    }

    #[tokio::test]
    async fn fs_delete_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        let location = store.put(b"x", "k/original.jpg").await.unwrap();
        assert!(store.delete(&location).await.unwrap());
        assert!(!store.delete(&location).await.unwrap());
    }
}
