//! String key-value storage for tierkv.
//!
//! This crate defines the [`StringStore`] contract shared by every backend
//! and the two backends that need nothing from a hosting environment.
//!
//! # Storage Backends
//!
//! - [`TableStore`] -- in-process table; always available, lowest durability
//! - [`DirectoryStore`] -- one file per key under a scope directory; highest
//!   durability
//!
//! Hosted backends (session storage, private filesystem) live in
//! `tierkv-web`; composition of several backends into one logical store
//! lives in `tierkv-tier`.
//!
//! # Design Rules
//!
//! 1. A missing key is a value (`Ok(None)`), never an error.
//! 2. Medium failures are propagated with their original cause attached.
//! 3. Deleting something already gone and clearing an empty store succeed.
//! 4. A scope is fixed at construction; scopes never observe each other.
//! 5. Filesystem-backed mediums only accept keys on the allow-list in
//!    [`names`].

pub mod dir;
pub mod error;
pub mod memory;
pub mod names;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use dir::DirectoryStore;
pub use error::{BoxError, StoreError, StoreResult};
pub use memory::{SharedTable, TableStore};
pub use names::{validate_key, validate_scope, SCOPE_SEPARATOR};
pub use traits::{priority, BackendKind, Priority, StringStore};
