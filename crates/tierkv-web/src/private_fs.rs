//! Private-filesystem string store.
//!
//! Backed by an origin-scoped, handle-based directory abstraction provided by
//! the hosting environment. Entries are reached through opaque handles, never
//! through path strings. The store's scope is a sub-directory of the origin
//! root, and each key is one file inside it.
//!
//! Only [`CapabilityError::NotFound`] is reported as a missing key; every
//! other host failure is surfaced to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use tierkv_store::{
    validate_key, validate_scope, BackendKind, Priority, StoreResult, StringStore,
};

use crate::error::{CapabilityError, CapabilityResult};

/// Kind of a directory entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One entry of a directory listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// Host-provided handle to a directory.
#[async_trait]
pub trait DirectoryHandle: Send + Sync {
    /// Handle to the file `name`, creating it when `create` is set.
    ///
    /// Fails with `NotFound` when absent and `create` is not set, and with
    /// `TypeMismatch` when `name` is a directory.
    async fn get_file_handle(&self, name: &str, create: bool)
        -> CapabilityResult<Arc<dyn FileHandle>>;

    /// Handle to the sub-directory `name`, creating it when `create` is set.
    async fn get_directory_handle(
        &self,
        name: &str,
        create: bool,
    ) -> CapabilityResult<Arc<dyn DirectoryHandle>>;

    /// Remove the entry `name`. Fails with `NotFound` when absent.
    async fn remove_entry(&self, name: &str, recursive: bool) -> CapabilityResult<()>;

    /// List the entries of this directory.
    ///
    /// Returns `Ok(None)` when the host does not expose enumeration.
    async fn entries(&self) -> CapabilityResult<Option<Vec<DirEntry>>>;
}

/// Host-provided handle to a file.
#[async_trait]
pub trait FileHandle: Send + Sync {
    /// Full contents as text.
    async fn text(&self) -> CapabilityResult<String>;

    /// Open a stream that replaces the file's contents once closed.
    async fn create_writable(&self) -> CapabilityResult<Box<dyn WritableFileStream>>;
}

/// Write stream over a file. Must be released with `close` or `abort`.
#[async_trait]
pub trait WritableFileStream: Send {
    async fn write(&mut self, data: &str) -> CapabilityResult<()>;

    /// Flush and release, committing everything written.
    async fn close(self: Box<Self>) -> CapabilityResult<()>;

    /// Release without committing; the file keeps its previous contents.
    async fn abort(self: Box<Self>) -> CapabilityResult<()>;
}

/// String store over a host private filesystem.
pub struct PrivateFsStore {
    dir: Arc<dyn DirectoryHandle>,
    scope: String,
    priority: Priority,
}

impl PrivateFsStore {
    /// Open the store for `scope` under the host's origin root directory,
    /// creating the scope directory if needed.
    pub async fn open(origin_root: Arc<dyn DirectoryHandle>, scope: &str) -> StoreResult<Self> {
        validate_scope(scope)?;
        let dir = origin_root
            .get_directory_handle(scope, true)
            .await
            .map_err(|e| e.into_store_error(BackendKind::PrivateFs, scope))?;
        Ok(Self {
            dir,
            scope: scope.to_string(),
            priority: BackendKind::PrivateFs.default_priority(),
        })
    }

    /// Override the tier weight.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Write `value` through `stream`, releasing the stream on every path.
    ///
    /// A failed write aborts the stream so the previous contents survive.
    async fn write_through(
        mut stream: Box<dyn WritableFileStream>,
        value: &str,
    ) -> CapabilityResult<()> {
        match stream.write(value).await {
            Ok(()) => stream.close().await,
            Err(write_err) => {
                if let Err(abort_err) = stream.abort().await {
                    warn!(error = %abort_err, "failed to release write stream after failed write");
                }
                Err(write_err)
            }
        }
    }
}

impl std::fmt::Debug for PrivateFsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateFsStore")
            .field("scope", &self.scope)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StringStore for PrivateFsStore {
    fn backend(&self) -> BackendKind {
        BackendKind::PrivateFs
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
        validate_key(key)?;
        trace!(scope = %self.scope, key, "private fs get");
        let handle = match self.dir.get_file_handle(key, false).await {
            Ok(handle) => handle,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into_store_error(BackendKind::PrivateFs, key)),
        };
        match handle.text().await {
            Ok(text) => Ok(Some(text)),
            // Removed between lookup and read.
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into_store_error(BackendKind::PrivateFs, key)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        validate_key(key)?;
        trace!(scope = %self.scope, key, len = value.len(), "private fs set");
        let to_store_error = |e: CapabilityError| e.into_store_error(BackendKind::PrivateFs, key);
        let handle = self
            .dir
            .get_file_handle(key, true)
            .await
            .map_err(to_store_error)?;
        let stream = handle.create_writable().await.map_err(to_store_error)?;
        Self::write_through(stream, value)
            .await
            .map_err(to_store_error)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        validate_key(key)?;
        trace!(scope = %self.scope, key, "private fs delete");
        match self.dir.remove_entry(key, true).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into_store_error(BackendKind::PrivateFs, key)),
        }
    }

    async fn clear(&self) -> StoreResult<()> {
        let entries = self
            .dir
            .entries()
            .await
            .map_err(|e| e.into_store_error(BackendKind::PrivateFs, &self.scope))?;
        let Some(entries) = entries else {
            debug!(scope = %self.scope, "host cannot enumerate private fs; clear skipped");
            return Ok(());
        };

        let mut removed = 0usize;
        for entry in entries {
            match self.dir.remove_entry(&entry.name, true).await {
                Ok(()) => removed += 1,
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into_store_error(BackendKind::PrivateFs, &entry.name)),
            }
        }
        debug!(scope = %self.scope, removed, "private fs cleared");
        Ok(())
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        trace!(scope = %self.scope, "private fs keys");
        let entries = self
            .dir
            .entries()
            .await
            .map_err(|e| e.into_store_error(BackendKind::PrivateFs, &self.scope))?;
        match entries {
            Some(entries) => Ok(entries
                .into_iter()
                .filter(|e| e.kind == EntryKind::File)
                .map(|e| e.name)
                .collect()),
            None => {
                debug!(scope = %self.scope, "host cannot enumerate private fs; no keys reported");
                Ok(Vec::new())
            }
        }
    }
}
