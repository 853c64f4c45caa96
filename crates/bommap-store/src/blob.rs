use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use bommap_model::BlobRef;

use crate::clock::Clock;
use crate::error::{Result, StoreError};

/// Time-limited handle for downloading a stored blob. The engine hands the
/// `url` to callers verbatim; only the issuing store can resolve it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RetrievalLocator {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Object storage for uploaded and processed files, keyed by opaque
/// [`BlobRef`] locators.
pub trait BlobStore: Send + Sync {
    fn put(&self, key: &BlobRef, bytes: &[u8]) -> Result<()>;

    /// `None` when the key was never written or has been deleted.
    fn get(&self, key: &BlobRef) -> Result<Option<Vec<u8>>>;

    /// Returns whether a blob was actually removed.
    fn delete(&self, key: &BlobRef) -> Result<bool>;

    fn retrieval_locator(&self, key: &BlobRef, ttl: Duration) -> Result<RetrievalLocator>;
}

/// In-memory blob store for tests and single-process runs.
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryBlobStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            blobs: Mutex::new(BTreeMap::new()),
            clock,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.blobs
            .lock()
            .map_err(|_| StoreError::Unavailable("blob store lock poisoned".to_string()))
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, key: &BlobRef, bytes: &[u8]) -> Result<()> {
        self.lock()?.insert(key.as_str().to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &BlobRef) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key.as_str()).cloned())
    }

    fn delete(&self, key: &BlobRef) -> Result<bool> {
        Ok(self.lock()?.remove(key.as_str()).is_some())
    }

    fn retrieval_locator(&self, key: &BlobRef, ttl: Duration) -> Result<RetrievalLocator> {
        if self.lock()?.get(key.as_str()).is_none() {
            return Err(StoreError::MissingRecord {
                table: "blobs".to_string(),
                key: key.as_str().to_string(),
            });
        }
        Ok(RetrievalLocator {
            url: format!("memory://{}", key.as_str()),
            expires_at: self.clock.now() + ttl,
        })
    }
}

/// Filesystem blob store rooted at a directory. Blob keys map to relative
/// paths below the root; keys that would escape the root are rejected.
pub struct FsBlobStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| StoreError::BlobIo {
            operation: "create root for",
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self { root, clock })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &BlobRef) -> Result<PathBuf> {
        let relative = Path::new(key.as_str());
        let escapes = relative.components().any(|component| {
            !matches!(component, Component::Normal(_) | Component::CurDir)
        });
        if escapes {
            return Err(StoreError::InvalidBlobKey {
                key: key.as_str().to_string(),
                root: self.root.clone(),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, key: &BlobRef, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::BlobIo {
                operation: "create directory for",
                key: key.as_str().to_string(),
                source,
            })?;
        }
        std::fs::write(&path, bytes).map_err(|source| StoreError::BlobIo {
            operation: "write",
            key: key.as_str().to_string(),
            source,
        })?;
        tracing::debug!(key = key.as_str(), bytes = bytes.len(), "stored blob");
        Ok(())
    }

    fn get(&self, key: &BlobRef) -> Result<Option<Vec<u8>>> {
        let path = self.resolve(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::BlobIo {
                operation: "read",
                key: key.as_str().to_string(),
                source,
            }),
        }
    }

    fn delete(&self, key: &BlobRef) -> Result<bool> {
        let path = self.resolve(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::BlobIo {
                operation: "delete",
                key: key.as_str().to_string(),
                source,
            }),
        }
    }

    fn retrieval_locator(&self, key: &BlobRef, ttl: Duration) -> Result<RetrievalLocator> {
        let path = self.resolve(key)?;
        if !path.is_file() {
            return Err(StoreError::MissingRecord {
                table: "blobs".to_string(),
                key: key.as_str().to_string(),
            });
        }
        Ok(RetrievalLocator {
            url: format!("file://{}", path.display()),
            expires_at: self.clock.now() + ttl,
        })
    }
}
