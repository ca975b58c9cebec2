//! Directory-backed string store.
//!
//! Layout: the store's root is `<base>/<scope>`. Each key is exactly one
//! regular file directly under the root, holding the raw UTF-8 bytes of the
//! value. There is no metadata sidecar and no nesting by key structure.
//!
//! Writes are not atomic with respect to concurrent writers of the same key;
//! the last write to land on disk wins. No locking, no retries.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, trace, warn};

use crate::error::{StoreError, StoreResult};
use crate::names::{validate_key, validate_scope};
use crate::traits::{BackendKind, Priority, StringStore};

/// String store persisting one file per key under a scope directory.
#[derive(Clone, Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    scope: String,
    priority: Priority,
}

impl DirectoryStore {
    /// Open a store whose root `<base>/<scope>` already exists.
    ///
    /// Fails with [`StoreError::MissingRoot`] if the root is absent, and with
    /// an I/O error if it exists but is not a directory.
    pub async fn open(base: impl AsRef<Path>, scope: &str) -> StoreResult<Self> {
        validate_scope(scope)?;
        let root = base.as_ref().join(scope);
        match fs::metadata(&root).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(StoreError::io(
                    &root,
                    std::io::Error::other("store root is not a directory"),
                ));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::MissingRoot(root));
            }
            Err(e) => return Err(StoreError::io(&root, e)),
        }
        Ok(Self {
            root,
            scope: scope.to_string(),
            priority: BackendKind::Directory.default_priority(),
        })
    }

    /// Create `<base>/<scope>` (recursively) if needed, then open it.
    pub async fn create(base: impl AsRef<Path>, scope: &str) -> StoreResult<Self> {
        validate_scope(scope)?;
        let root = base.as_ref().join(scope);
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io(&root, e))?;
        debug!(root = %root.display(), "directory store root ready");
        Self::open(base, scope).await
    }

    /// Override the tier weight.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Directory holding this store's files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    /// Returns `true` if the root was removed after the store was opened.
    async fn root_missing(&self) -> bool {
        !fs::try_exists(&self.root).await.unwrap_or(true)
    }

    /// Map an I/O failure, reporting a vanished root as misconfiguration.
    async fn failure(&self, path: &Path, e: std::io::Error) -> StoreError {
        if e.kind() == ErrorKind::NotFound && self.root_missing().await {
            return StoreError::MissingRoot(self.root.clone());
        }
        StoreError::io(path, e)
    }

    /// Remove one entry under the root. Returns `false` if it was already gone.
    async fn remove_entry(&self, path: &Path) -> StoreResult<bool> {
        let meta = match fs::symlink_metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        let removed = if meta.is_dir() {
            fs::remove_dir_all(path).await
        } else {
            fs::remove_file(path).await
        };
        match removed {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

#[async_trait]
impl StringStore for DirectoryStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Directory
    }

    fn scope(&self) -> &str {
        &self.scope
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn validate_key(&self, key: &str) -> StoreResult<()> {
        validate_key(key)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.key_path(key)?;
        trace!(path = %path.display(), "directory get");
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if self.root_missing().await {
                    return Err(StoreError::MissingRoot(self.root.clone()));
                }
                return Ok(None);
            }
            Err(e) => return Err(self.failure(&path, e).await),
        };
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| StoreError::InvalidUtf8 {
                key: key.to_string(),
            })
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.key_path(key)?;
        trace!(path = %path.display(), len = value.len(), "directory set");
        match fs::write(&path, value.as_bytes()).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.failure(&path, e).await),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let path = self.key_path(key)?;
        trace!(path = %path.display(), "directory delete");
        let removed = self.remove_entry(&path).await?;
        if !removed && self.root_missing().await {
            return Err(StoreError::MissingRoot(self.root.clone()));
        }
        Ok(removed)
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(root = %self.root.display(), "clear on missing root");
                return Ok(());
            }
            Err(e) => return Err(StoreError::io(&self.root, e)),
        };

        let mut removed = 0usize;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.root, e))?
        {
            if self.remove_entry(&entry.path()).await? {
                removed += 1;
            }
        }
        debug!(root = %self.root.display(), removed, "directory cleared");
        Ok(())
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        trace!(root = %self.root.display(), "directory keys");
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.root, e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.root, e))?
        {
            // An entry can vanish between listing and inspection.
            let file_type = match entry.file_type().await {
                Ok(ft) => ft,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::io(entry.path(), e)),
            };
            if !file_type.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => match validate_key(&name) {
                    Ok(()) => keys.push(name),
                    Err(e) => {
                        warn!(root = %self.root.display(), name = ?name, error = %e, "skipping file not addressable as a key");
                    }
                },
                Err(name) => {
                    warn!(root = %self.root.display(), name = ?name, "skipping non-UTF-8 file name");
                }
            }
        }
        Ok(keys)
    }
}
