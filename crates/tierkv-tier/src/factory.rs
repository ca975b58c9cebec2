//! Backend assembly.
//!
//! [`assemble`] inspects the capabilities the host injected, builds one store
//! per usable backend, and returns them as a [`TierSet`] ordered by
//! ascending priority. The table store is always present, so the set is
//! never empty. An optional backend that cannot be constructed, or whose
//! probe write fails, is left out; the caller never sees that failure.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use tierkv_store::{
    BackendKind, DirectoryStore, Priority, StoreResult, StringStore, TableStore,
};
use tierkv_web::{DirectoryHandle, PrivateFsStore, SessionStorage, SessionStore};

use crate::config::TierConfig;
use crate::error::TierResult;

/// Storage capabilities offered by the hosting environment.
///
/// Every field is optional; an absent capability excludes its backend.
#[derive(Clone, Default)]
pub struct HostCapabilities {
    /// Session-lifetime key-value object.
    pub session_storage: Option<Arc<dyn SessionStorage>>,
    /// Root directory handle of the origin-private filesystem.
    pub private_fs: Option<Arc<dyn DirectoryHandle>>,
    /// Base directory on the local filesystem.
    pub directory_base: Option<PathBuf>,
}

impl HostCapabilities {
    /// No optional capabilities: only the table tier will be assembled.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_session_storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.session_storage = Some(storage);
        self
    }

    pub fn with_private_fs(mut self, root: Arc<dyn DirectoryHandle>) -> Self {
        self.private_fs = Some(root);
        self
    }

    pub fn with_directory(mut self, base: impl Into<PathBuf>) -> Self {
        self.directory_base = Some(base.into());
        self
    }
}

impl std::fmt::Debug for HostCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostCapabilities")
            .field("session_storage", &self.session_storage.is_some())
            .field("private_fs", &self.private_fs.is_some())
            .field("directory_base", &self.directory_base)
            .finish()
    }
}

/// Non-empty collection of stores ordered by ascending priority.
///
/// Stores with equal priority keep the order in which they were added.
#[derive(Clone)]
pub struct TierSet {
    tiers: Vec<Arc<dyn StringStore>>,
}

impl TierSet {
    /// Start a set from its guaranteed member.
    pub fn new(first: Arc<dyn StringStore>) -> Self {
        Self { tiers: vec![first] }
    }

    /// Add a store, keeping ascending priority order.
    pub fn push(&mut self, store: Arc<dyn StringStore>) {
        let at = self
            .tiers
            .partition_point(|t| t.priority() <= store.priority());
        self.tiers.insert(at, store);
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, store: Arc<dyn StringStore>) -> Self {
        self.push(store);
        self
    }

    /// Tiers from lowest to highest priority.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Arc<dyn StringStore>> {
        self.tiers.iter()
    }

    /// Tiers from highest to lowest priority.
    pub fn iter_by_precedence(&self) -> impl Iterator<Item = &Arc<dyn StringStore>> {
        self.tiers.iter().rev()
    }

    pub fn highest(&self) -> &Arc<dyn StringStore> {
        // `tiers` is never empty.
        &self.tiers[self.tiers.len() - 1]
    }

    pub fn lowest(&self) -> &Arc<dyn StringStore> {
        &self.tiers[0]
    }

    /// First tier bound to `backend`.
    pub fn find(&self, backend: BackendKind) -> Option<&Arc<dyn StringStore>> {
        self.tiers.iter().find(|t| t.backend() == backend)
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// `(backend, priority)` of every tier, lowest first.
    pub fn describe(&self) -> Vec<(BackendKind, Priority)> {
        self.tiers
            .iter()
            .map(|t| (t.backend(), t.priority()))
            .collect()
    }
}

impl std::fmt::Debug for TierSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.describe()).finish()
    }
}

/// Build every backend the host supports for `config`.
///
/// Fails only when `config` itself is invalid.
pub async fn assemble(config: &TierConfig, caps: &HostCapabilities) -> TierResult<TierSet> {
    config.validate()?;
    let scope = config.scope.as_str();
    let priorities = &config.priorities;

    let table = TableStore::new(scope)?.with_priority(priorities.table);
    let mut tiers = TierSet::new(Arc::new(table));

    if let Some(storage) = &caps.session_storage {
        let built = SessionStore::new(storage.clone(), scope)
            .map(|s| Arc::new(s.with_priority(priorities.session)) as Arc<dyn StringStore>);
        admit(&mut tiers, BackendKind::Session, built).await;
    }

    if let Some(root) = &caps.private_fs {
        let built = PrivateFsStore::open(root.clone(), scope)
            .await
            .map(|s| Arc::new(s.with_priority(priorities.private_fs)) as Arc<dyn StringStore>);
        admit(&mut tiers, BackendKind::PrivateFs, built).await;
    }

    let directory_base = caps.directory_base.as_ref().or(config.directory.as_ref());
    if let Some(base) = directory_base {
        let built = DirectoryStore::create(base, scope)
            .await
            .map(|s| Arc::new(s.with_priority(priorities.directory)) as Arc<dyn StringStore>);
        admit(&mut tiers, BackendKind::Directory, built).await;
    }

    info!(scope, tiers = ?tiers, "tiers assembled");
    Ok(tiers)
}

/// Add a constructed backend to `tiers` if it survives a probe.
async fn admit(
    tiers: &mut TierSet,
    backend: BackendKind,
    built: StoreResult<Arc<dyn StringStore>>,
) {
    let store = match built {
        Ok(store) => store,
        Err(e) => {
            warn!(%backend, error = %e, "backend unavailable; excluded");
            return;
        }
    };
    match probe(store.as_ref()).await {
        Ok(()) => {
            debug!(%backend, priority = store.priority(), "backend admitted");
            tiers.push(store);
        }
        Err(e) => warn!(%backend, error = %e, "backend probe failed; excluded"),
    }
}

/// Write, read back, and remove a uniquely named entry.
pub async fn probe(store: &dyn StringStore) -> StoreResult<()> {
    let key = format!("tierkv-probe-{}", Uuid::now_v7());
    let token = Uuid::now_v7().to_string();
    if let Err(e) = store.set(&key, &token).await {
        // A failed write can still leave an entry behind.
        if let Err(cleanup) = store.delete(&key).await {
            debug!(backend = %store.backend(), error = %cleanup, "probe cleanup failed");
        }
        return Err(e);
    }
    let read = store.get(&key).await;
    store.delete(&key).await?;
    match read? {
        Some(found) if found == token => Ok(()),
        _ => Err(tierkv_store::StoreError::Unavailable {
            backend: store.backend(),
            reason: "probe value did not read back".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use tierkv_web::{MemoryDirectory, MemorySessionStorage};

    use super::*;

    fn config(scope: &str) -> TierConfig {
        TierConfig {
            scope: scope.into(),
            ..TierConfig::default()
        }
    }

    #[tokio::test]
    async fn table_only_without_capabilities() {
        let tiers = assemble(&config("app"), &HostCapabilities::none())
            .await
            .unwrap();
        assert_eq!(tiers.len(), 1);
        assert_eq!(tiers.highest().backend(), BackendKind::Table);
    }

    #[tokio::test]
    async fn all_backends_in_ascending_priority() {
        let dir = TempDir::new().unwrap();
        let caps = HostCapabilities::none()
            .with_session_storage(Arc::new(MemorySessionStorage::new()))
            .with_private_fs(Arc::new(MemoryDirectory::new()))
            .with_directory(dir.path());

        let tiers = assemble(&config("app"), &caps).await.unwrap();
        let order: Vec<BackendKind> = tiers.describe().into_iter().map(|(b, _)| b).collect();
        assert_eq!(
            order,
            vec![
                BackendKind::Table,
                BackendKind::Session,
                BackendKind::PrivateFs,
                BackendKind::Directory
            ]
        );
        assert!(dir.path().join("app").is_dir());
    }

    #[tokio::test]
    async fn probe_leaves_no_residue() {
        let dir = TempDir::new().unwrap();
        let session = Arc::new(MemorySessionStorage::new());
        let caps = HostCapabilities::none()
            .with_session_storage(session.clone())
            .with_directory(dir.path());

        let tiers = assemble(&config("app"), &caps).await.unwrap();
        for tier in tiers.iter() {
            assert!(tier.keys().await.unwrap().is_empty(), "{}", tier.backend());
        }
        assert_eq!(session.length().unwrap(), 0);
    }

    #[tokio::test]
    async fn failing_probe_excludes_backend() {
        let session = Arc::new(MemorySessionStorage::new());
        session.set_access_denied(true);
        let private = MemoryDirectory::new();
        private.set_fail_writes(true);
        let caps = HostCapabilities::none()
            .with_session_storage(session)
            .with_private_fs(Arc::new(private.clone()));

        let tiers = assemble(&config("app"), &caps).await.unwrap();
        assert_eq!(tiers.len(), 1);
        assert!(tiers.find(BackendKind::Session).is_none());
        assert!(tiers.find(BackendKind::PrivateFs).is_none());

        private.set_fail_writes(false);
        let scope_dir = private.get_directory_handle("app", false).await.unwrap();
        assert_eq!(scope_dir.entries().await.unwrap(), Some(Vec::new()));
        assert_eq!(private.open_streams(), 0);
    }

    #[tokio::test]
    async fn unusable_directory_is_excluded() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let caps = HostCapabilities::none().with_directory(&blocker);

        let tiers = assemble(&config("app"), &caps).await.unwrap();
        assert!(tiers.find(BackendKind::Directory).is_none());
    }

    #[tokio::test]
    async fn directory_from_config_when_host_offers_none() {
        let dir = TempDir::new().unwrap();
        let cfg = TierConfig {
            directory: Some(dir.path().to_path_buf()),
            ..config("cfg")
        };
        let tiers = assemble(&cfg, &HostCapabilities::none()).await.unwrap();
        assert_eq!(tiers.highest().backend(), BackendKind::Directory);
    }

    #[tokio::test]
    async fn configured_priorities_reorder_tiers() {
        let mut cfg = config("app");
        cfg.priorities.session = 100;
        let caps = HostCapabilities::none()
            .with_session_storage(Arc::new(MemorySessionStorage::new()))
            .with_private_fs(Arc::new(MemoryDirectory::new()));

        let tiers = assemble(&cfg, &caps).await.unwrap();
        assert_eq!(tiers.highest().backend(), BackendKind::Session);
        assert_eq!(tiers.highest().priority(), 100);
    }

    #[tokio::test]
    async fn invalid_scope_is_a_config_error() {
        assert!(assemble(&config("a/b"), &HostCapabilities::none())
            .await
            .is_err());
    }

    #[test]
    fn equal_priorities_keep_insertion_order() {
        let first: Arc<dyn StringStore> = Arc::new(TableStore::new("a").unwrap());
        let second: Arc<dyn StringStore> = Arc::new(TableStore::new("b").unwrap());
        let tiers = TierSet::new(first).with(second);
        assert_eq!(tiers.lowest().scope(), "a");
        assert_eq!(tiers.highest().scope(), "b");
    }
}
