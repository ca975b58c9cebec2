use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::trace;

use crate::error::{StoreError, StoreResult};
use crate::names::validate_scope;
use crate::traits::{BackendKind, Priority, StringStore};

type Scopes = HashMap<String, HashMap<String, String>>;

/// In-process table that several [`TableStore`]s can share.
///
/// Entries are partitioned by scope. Cloning a `SharedTable` yields another
/// handle to the same table.
#[derive(Clone, Debug, Default)]
pub struct SharedTable {
    scopes: Arc<RwLock<Scopes>>,
}

impl SharedTable {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scopes that currently hold at least one entry.
    pub fn scope_count(&self) -> StoreResult<usize> {
        self.scopes
            .read()
            .map(|s| s.values().filter(|m| !m.is_empty()).count())
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

/// Table-backed string store.
///
/// Always available and needs no setup. Contents are lost when the owning
/// process ends, which makes this the fallback of last resort. Every
/// operation completes without suspending.
#[derive(Debug)]
pub struct TableStore {
    table: SharedTable,
    scope: String,
    priority: Priority,
}

impl TableStore {
    /// Create a store over a fresh, private table.
    pub fn new(scope: &str) -> StoreResult<Self> {
        Self::with_table(SharedTable::new(), scope)
    }

    /// Create a store over an existing table, isolated by `scope`.
    pub fn with_table(table: SharedTable, scope: &str) -> StoreResult<Self> {
        validate_scope(scope)?;
        Ok(Self {
            table,
            scope: scope.to_string(),
            priority: BackendKind::Table.default_priority(),
        })
    }

    /// Override the tier weight.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Number of entries in this scope.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self
            .read_scopes()?
            .get(&self.scope)
            .map_or(0, HashMap::len))
    }

    /// Returns `true` if this scope holds no entries.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn read_scopes(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Scopes>> {
        self.table
            .scopes
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write_scopes(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Scopes>> {
        self.table
            .scopes
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

#[async_trait]
impl StringStore for TableStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Table
    }

    fn scope(&self) -> &str {
        &self.scope
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        trace!(scope = %self.scope, key, "table get");
        let scopes = self.read_scopes()?;
        Ok(scopes.get(&self.scope).and_then(|m| m.get(key)).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        trace!(scope = %self.scope, key, len = value.len(), "table set");
        let mut scopes = self.write_scopes()?;
        scopes
            .entry(self.scope.clone())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        trace!(scope = %self.scope, key, "table delete");
        let mut scopes = self.write_scopes()?;
        Ok(scopes
            .get_mut(&self.scope)
            .and_then(|m| m.remove(key))
            .is_some())
    }

    async fn clear(&self) -> StoreResult<()> {
        trace!(scope = %self.scope, "table clear");
        let mut scopes = self.write_scopes()?;
        scopes.remove(&self.scope);
        Ok(())
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        trace!(scope = %self.scope, "table keys");
        let scopes = self.read_scopes()?;
        Ok(scopes
            .get(&self.scope)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn store() -> TableStore {
        TableStore::new("test").unwrap()
    }

    // -----------------------------------------------------------------------
    // Core operations
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn set_get_delete_scenario() {
        let store = store();
        store.set("a", "1").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));

        assert!(store.delete("a").await.unwrap());
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn fresh_store_is_empty() {
        let store = store();
        assert_eq!(store.get("anything").await.unwrap(), None);
        assert!(store.keys().await.unwrap().is_empty());
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn set_overwrites() {
        let store = store();
        store.set("k", "old").await.unwrap();
        store.set("k", "new").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_missing_is_idempotent() {
        let store = store();
        assert!(!store.delete("never").await.unwrap());
        assert!(!store.delete("never").await.unwrap());
        assert_eq!(store.get("never").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let store = store();
        for i in 0..5 {
            store.set(&format!("k{i}"), "v").await.unwrap();
        }
        store.clear().await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
        for i in 0..5 {
            assert_eq!(store.get(&format!("k{i}")).await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn keys_lists_stored_keys() {
        let store = store();
        store.set("x", "1").await.unwrap();
        store.set("y", "2").await.unwrap();
        let keys: HashSet<String> = store.keys().await.unwrap().into_iter().collect();
        assert_eq!(keys, HashSet::from(["x".to_string(), "y".to_string()]));
    }

    #[tokio::test]
    async fn accepts_arbitrary_keys_and_values() {
        let store = store();
        let value = "multi\nline ✓ value";
        store.set("a/b/../c", value).await.unwrap();
        store.set("", "empty key").await.unwrap();
        assert_eq!(store.get("a/b/../c").await.unwrap().as_deref(), Some(value));
        assert_eq!(store.get("").await.unwrap().as_deref(), Some("empty key"));
    }

    // -----------------------------------------------------------------------
    // Scope isolation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn shared_table_isolates_scopes() {
        let table = SharedTable::new();
        let a = TableStore::with_table(table.clone(), "a").unwrap();
        let b = TableStore::with_table(table.clone(), "b").unwrap();

        a.set("k", "from-a").await.unwrap();
        assert_eq!(b.get("k").await.unwrap(), None);
        assert!(b.keys().await.unwrap().is_empty());

        b.set("k", "from-b").await.unwrap();
        b.clear().await.unwrap();
        assert_eq!(a.get("k").await.unwrap().as_deref(), Some("from-a"));
        assert_eq!(table.scope_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn same_scope_on_shared_table_sees_same_entries() {
        let table = SharedTable::new();
        let first = TableStore::with_table(table.clone(), "cfg").unwrap();
        let second = TableStore::with_table(table, "cfg").unwrap();
        first.set("k", "v").await.unwrap();
        assert_eq!(second.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn poisoned_table_is_an_error_everywhere() {
        let table = SharedTable::new();
        let store = TableStore::with_table(table.clone(), "p").unwrap();
        let scopes = table.scopes.clone();
        let _ = std::thread::spawn(move || {
            let _guard = scopes.write().unwrap();
            panic!("writer panicked");
        })
        .join();

        assert!(matches!(store.len(), Err(StoreError::Poisoned(_))));
        assert!(matches!(store.is_empty(), Err(StoreError::Poisoned(_))));
        assert!(matches!(table.scope_count(), Err(StoreError::Poisoned(_))));
        assert!(matches!(store.get("k").await, Err(StoreError::Poisoned(_))));
    }

    /// Log sink that keeps everything written to it.
    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn key_listing_is_traced() {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        let dir = tempfile::TempDir::new().unwrap();
        tracing::subscriber::with_default(subscriber, || {
            rt.block_on(async {
                store().keys().await.unwrap();
                crate::DirectoryStore::create(dir.path(), "traced")
                    .await
                    .unwrap()
                    .keys()
                    .await
                    .unwrap();
            })
        });

        let log = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(log.contains("table keys"), "{log}");
        assert!(log.contains("directory keys"), "{log}");
    }

    #[test]
    fn rejects_invalid_scope() {
        assert!(TableStore::new("").is_err());
        assert!(TableStore::new("a:b").is_err());
    }

    #[test]
    fn priority_defaults_lowest_and_can_be_overridden() {
        let store = store();
        assert_eq!(store.priority(), crate::priority::TABLE);
        assert_eq!(store.with_priority(42).priority(), 42);
    }
}
