//! Session-scoped string store.
//!
//! Backed by a flat key-value object that the hosting environment keeps for
//! the lifetime of a browsing session. Several scopes share that one object,
//! so each physical key is `scope + SCOPE_SEPARATOR + key`. The same
//! separator is used when writing and when scanning for a scope's keys.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use tierkv_store::{
    validate_scope, BackendKind, Priority, StoreResult, StringStore, SCOPE_SEPARATOR,
};

use crate::error::CapabilityResult;

/// Host-provided session storage object.
///
/// Mirrors the browser `Storage` interface. Calls complete immediately.
pub trait SessionStorage: Send + Sync {
    /// Number of entries across every scope.
    fn length(&self) -> CapabilityResult<usize>;

    /// Name of the entry at `index`, or `None` past the end.
    fn key(&self, index: usize) -> CapabilityResult<Option<String>>;

    fn get_item(&self, key: &str) -> CapabilityResult<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> CapabilityResult<()>;

    /// Remove an entry. Removing an absent entry is not an error.
    fn remove_item(&self, key: &str) -> CapabilityResult<()>;
}

/// String store namespaced by scope prefix inside a shared
/// [`SessionStorage`] object.
///
/// Read failures from the host (for example access restrictions) are
/// logged and reported as a missing key, trading precision for
/// availability. Write failures propagate.
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    scope: String,
    prefix: String,
    priority: Priority,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>, scope: &str) -> StoreResult<Self> {
        validate_scope(scope)?;
        Ok(Self {
            storage,
            scope: scope.to_string(),
            prefix: format!("{scope}{SCOPE_SEPARATOR}"),
            priority: BackendKind::Session.default_priority(),
        })
    }

    /// Override the tier weight.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    fn physical_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Every physical key in the shared object that belongs to this scope.
    ///
    /// Scans the whole object: cost grows with the total number of entries,
    /// not with the number of entries in this scope.
    fn scoped_physical_keys(&self) -> StoreResult<Vec<String>> {
        let backend = BackendKind::Session;
        let length = self
            .storage
            .length()
            .map_err(|e| e.into_store_error(backend, &self.prefix))?;
        let mut keys = Vec::new();
        for index in 0..length {
            let key = self
                .storage
                .key(index)
                .map_err(|e| e.into_store_error(backend, &self.prefix))?;
            match key {
                Some(key) if key.starts_with(&self.prefix) => keys.push(key),
                Some(_) => {}
                None => break,
            }
        }
        Ok(keys)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("scope", &self.scope)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StringStore for SessionStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Session
    }

    fn scope(&self) -> &str {
        &self.scope
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        trace!(scope = %self.scope, key, "session get");
        match self.storage.get_item(&self.physical_key(key)) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(scope = %self.scope, key, error = %e, "session read failed; treating as missing");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        trace!(scope = %self.scope, key, len = value.len(), "session set");
        self.storage
            .set_item(&self.physical_key(key), value)
            .map_err(|e| e.into_store_error(BackendKind::Session, key))
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        trace!(scope = %self.scope, key, "session delete");
        let physical = self.physical_key(key);
        let existed = self
            .storage
            .get_item(&physical)
            .map_err(|e| e.into_store_error(BackendKind::Session, key))?
            .is_some();
        if existed {
            self.storage
                .remove_item(&physical)
                .map_err(|e| e.into_store_error(BackendKind::Session, key))?;
        }
        Ok(existed)
    }

    async fn clear(&self) -> StoreResult<()> {
        let keys = self.scoped_physical_keys()?;
        for physical in &keys {
            self.storage
                .remove_item(physical)
                .map_err(|e| e.into_store_error(BackendKind::Session, physical))?;
        }
        debug!(scope = %self.scope, removed = keys.len(), "session cleared");
        Ok(())
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        trace!(scope = %self.scope, "session keys");
        Ok(self
            .scoped_physical_keys()?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
            .collect())
    }
}
