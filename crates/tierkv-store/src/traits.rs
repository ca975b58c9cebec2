use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// Tier weight of a store. Higher values are preferred when stores are
/// composed.
pub type Priority = i32;

/// Default tier weights for the built-in backends.
pub mod priority {
    use super::Priority;

    /// In-process table: always available, lost with the process.
    pub const TABLE: Priority = 0;
    /// Host session storage object: lives as long as the browsing session.
    pub const SESSION: Priority = 10;
    /// Host private filesystem: origin-scoped and persistent.
    pub const PRIVATE_FS: Priority = 20;
    /// Local directory: the most durable backend.
    pub const DIRECTORY: Priority = 30;
}

/// Which concrete medium a store is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Table,
    Session,
    PrivateFs,
    Directory,
    Tiered,
}

impl BackendKind {
    /// Default priority weight for this backend.
    pub fn default_priority(self) -> Priority {
        match self {
            Self::Table | Self::Tiered => priority::TABLE,
            Self::Session => priority::SESSION,
            Self::PrivateFs => priority::PRIVATE_FS,
            Self::Directory => priority::DIRECTORY,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Session => "session",
            Self::PrivateFs => "private_fs",
            Self::Directory => "directory",
            Self::Tiered => "tiered",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// String key-value store bound to one scope of one backing medium.
///
/// All implementations must satisfy these invariants:
/// - The scope is fixed at construction. Two stores sharing a medium under
///   different scopes never observe each other's keys.
/// - A missing key is `Ok(None)` from [`get`](Self::get) and `Ok(false)` from
///   [`delete`](Self::delete), never an `Err`.
/// - `Err` always means the medium failed or the input was rejected.
/// - Values are stored and returned unchanged as UTF-8 text.
/// - No ordering is guaranteed between concurrent writers of the same key.
#[async_trait]
pub trait StringStore: Send + Sync {
    /// Medium this store is bound to.
    fn backend(&self) -> BackendKind;

    /// Namespace isolating this store's keys within its medium.
    fn scope(&self) -> &str;

    /// Tier weight; higher is preferred when composed.
    fn priority(&self) -> Priority {
        self.backend().default_priority()
    }

    /// Check that `key` can be used with this backend.
    ///
    /// Backends without naming restrictions accept every key.
    fn validate_key(&self, _key: &str) -> StoreResult<()> {
        Ok(())
    }

    /// Retrieve the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key is absent.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove `key`. Returns `true` if something was removed.
    ///
    /// Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Remove every key in this store's scope.
    async fn clear(&self) -> StoreResult<()>;

    /// Snapshot of the keys currently held in this scope, in no particular
    /// order.
    async fn keys(&self) -> StoreResult<Vec<String>>;

    /// Returns `true` if `key` is present.
    async fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_priorities_are_ordered_by_durability() {
        assert!(BackendKind::Table.default_priority() < BackendKind::Session.default_priority());
        assert!(
            BackendKind::Session.default_priority() < BackendKind::PrivateFs.default_priority()
        );
        assert!(
            BackendKind::PrivateFs.default_priority() < BackendKind::Directory.default_priority()
        );
    }

    #[test]
    fn backend_kind_display() {
        assert_eq!(BackendKind::PrivateFs.to_string(), "private_fs");
        assert_eq!(BackendKind::Directory.to_string(), "directory");
    }
}
