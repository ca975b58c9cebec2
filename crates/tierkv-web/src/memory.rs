//! In-memory host capabilities.
//!
//! [`MemorySessionStorage`] and [`MemoryDirectory`] behave like the browser
//! objects they stand in for, so the stores in this crate can run in tests
//! and on native hosts. Both carry switches for injecting host failures.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{CapabilityError, CapabilityResult};
use crate::private_fs::{DirEntry, DirectoryHandle, EntryKind, FileHandle, WritableFileStream};
use crate::session::SessionStorage;

fn lock<T>(mutex: &Mutex<T>) -> CapabilityResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| CapabilityError::Other(format!("lock poisoned: {e}")))
}

// ---------------------------------------------------------------------------
// Session storage
// ---------------------------------------------------------------------------

/// In-memory [`SessionStorage`] with an optional byte quota.
///
/// The quota counts key and value lengths of every entry, as browsers do.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    entries: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
    access_denied: AtomicBool,
}

impl MemorySessionStorage {
    /// Unlimited storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage refusing writes that would exceed `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::default()
        }
    }

    /// Make every call fail with [`CapabilityError::Security`].
    pub fn set_access_denied(&self, denied: bool) {
        self.access_denied.store(denied, Ordering::SeqCst);
    }

    fn check_access(&self) -> CapabilityResult<()> {
        if self.access_denied.load(Ordering::SeqCst) {
            return Err(CapabilityError::Security(
                "session storage access denied".into(),
            ));
        }
        Ok(())
    }
}

impl SessionStorage for MemorySessionStorage {
    fn length(&self) -> CapabilityResult<usize> {
        self.check_access()?;
        Ok(lock(&self.entries)?.len())
    }

    fn key(&self, index: usize) -> CapabilityResult<Option<String>> {
        self.check_access()?;
        Ok(lock(&self.entries)?.keys().nth(index).cloned())
    }

    fn get_item(&self, key: &str) -> CapabilityResult<Option<String>> {
        self.check_access()?;
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> CapabilityResult<()> {
        self.check_access()?;
        let mut entries = lock(&self.entries)?;
        if let Some(quota) = self.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(CapabilityError::QuotaExceeded);
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> CapabilityResult<()> {
        self.check_access()?;
        lock(&self.entries)?.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Private filesystem
// ---------------------------------------------------------------------------

/// Failure switches and counters shared by every handle of one tree.
#[derive(Debug)]
struct HostState {
    enumerable: bool,
    fail_writes: AtomicBool,
    access_denied: AtomicBool,
    open_streams: AtomicUsize,
}

impl HostState {
    fn check_access(&self) -> CapabilityResult<()> {
        if self.access_denied.load(Ordering::SeqCst) {
            return Err(CapabilityError::Security("private fs access denied".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
enum Node {
    File(Arc<MemoryFile>),
    Directory(MemoryDirectory),
}

/// In-memory [`DirectoryHandle`].
///
/// Cloning yields another handle to the same directory. Handles obtained
/// from it share its failure switches.
#[derive(Clone, Debug)]
pub struct MemoryDirectory {
    children: Arc<Mutex<BTreeMap<String, Node>>>,
    host: Arc<HostState>,
}

impl MemoryDirectory {
    /// Empty origin root that supports enumeration.
    pub fn new() -> Self {
        Self::with_host(true)
    }

    /// Empty origin root whose `entries()` reports no enumeration support.
    pub fn without_enumeration() -> Self {
        Self::with_host(false)
    }

    fn with_host(enumerable: bool) -> Self {
        Self {
            children: Arc::new(Mutex::new(BTreeMap::new())),
            host: Arc::new(HostState {
                enumerable,
                fail_writes: AtomicBool::new(false),
                access_denied: AtomicBool::new(false),
                open_streams: AtomicUsize::new(0),
            }),
        }
    }

    fn child_directory(&self) -> Self {
        Self {
            children: Arc::new(Mutex::new(BTreeMap::new())),
            host: self.host.clone(),
        }
    }

    /// Make every stream write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.host.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every handle call fail with [`CapabilityError::Security`].
    pub fn set_access_denied(&self, denied: bool) {
        self.host.access_denied.store(denied, Ordering::SeqCst);
    }

    /// Write streams opened and not yet released, across the whole tree.
    pub fn open_streams(&self) -> usize {
        self.host.open_streams.load(Ordering::SeqCst)
    }
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryHandle for MemoryDirectory {
    async fn get_file_handle(
        &self,
        name: &str,
        create: bool,
    ) -> CapabilityResult<Arc<dyn FileHandle>> {
        self.host.check_access()?;
        let mut children = lock(&self.children)?;
        match children.get(name) {
            Some(Node::File(file)) => Ok(file.clone() as Arc<dyn FileHandle>),
            Some(Node::Directory(_)) => Err(CapabilityError::TypeMismatch(format!(
                "{name} is a directory"
            ))),
            None if create => {
                let file = Arc::new(MemoryFile {
                    contents: Arc::new(Mutex::new(String::new())),
                    host: self.host.clone(),
                });
                children.insert(name.to_string(), Node::File(file.clone()));
                Ok(file as Arc<dyn FileHandle>)
            }
            None => Err(CapabilityError::NotFound(name.to_string())),
        }
    }

    async fn get_directory_handle(
        &self,
        name: &str,
        create: bool,
    ) -> CapabilityResult<Arc<dyn DirectoryHandle>> {
        self.host.check_access()?;
        let mut children = lock(&self.children)?;
        match children.get(name) {
            Some(Node::Directory(dir)) => Ok(Arc::new(dir.clone()) as Arc<dyn DirectoryHandle>),
            Some(Node::File(_)) => Err(CapabilityError::TypeMismatch(format!("{name} is a file"))),
            None if create => {
                let dir = self.child_directory();
                children.insert(name.to_string(), Node::Directory(dir.clone()));
                Ok(Arc::new(dir) as Arc<dyn DirectoryHandle>)
            }
            None => Err(CapabilityError::NotFound(name.to_string())),
        }
    }

    async fn remove_entry(&self, name: &str, recursive: bool) -> CapabilityResult<()> {
        self.host.check_access()?;
        let mut children = lock(&self.children)?;
        if let Some(Node::Directory(dir)) = children.get(name) {
            if !recursive && !lock(&dir.children)?.is_empty() {
                return Err(CapabilityError::Other(format!(
                    "{name} is not empty; recursive removal required"
                )));
            }
        }
        children
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CapabilityError::NotFound(name.to_string()))
    }

    async fn entries(&self) -> CapabilityResult<Option<Vec<DirEntry>>> {
        self.host.check_access()?;
        if !self.host.enumerable {
            return Ok(None);
        }
        let children = lock(&self.children)?;
        Ok(Some(
            children
                .iter()
                .map(|(name, node)| DirEntry {
                    name: name.clone(),
                    kind: match node {
                        Node::File(_) => EntryKind::File,
                        Node::Directory(_) => EntryKind::Directory,
                    },
                })
                .collect(),
        ))
    }
}

/// In-memory [`FileHandle`].
#[derive(Debug)]
pub struct MemoryFile {
    contents: Arc<Mutex<String>>,
    host: Arc<HostState>,
}

#[async_trait]
impl FileHandle for MemoryFile {
    async fn text(&self) -> CapabilityResult<String> {
        self.host.check_access()?;
        Ok(lock(&self.contents)?.clone())
    }

    async fn create_writable(&self) -> CapabilityResult<Box<dyn WritableFileStream>> {
        self.host.check_access()?;
        self.host.open_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryWritable {
            target: self.contents.clone(),
            pending: String::new(),
            host: self.host.clone(),
        }))
    }
}

/// Stream that buffers writes and swaps them into the file on `close`.
struct MemoryWritable {
    target: Arc<Mutex<String>>,
    pending: String,
    host: Arc<HostState>,
}

impl HostState {
    fn release_stream(&self) {
        self.open_streams.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl WritableFileStream for MemoryWritable {
    async fn write(&mut self, data: &str) -> CapabilityResult<()> {
        if self.host.fail_writes.load(Ordering::SeqCst) {
            return Err(CapabilityError::Other("injected write failure".into()));
        }
        self.pending.push_str(data);
        Ok(())
    }

    async fn close(self: Box<Self>) -> CapabilityResult<()> {
        let MemoryWritable {
            target,
            pending,
            host,
        } = *self;
        host.release_stream();
        *lock(&target)? = pending;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> CapabilityResult<()> {
        self.host.release_stream();
        Ok(())
    }
}
