//! Hosted-medium string stores for tierkv.
//!
//! Browser-style hosts offer two storage capabilities that the
//! [`StringStore`](tierkv_store::StringStore) contract can sit on:
//!
//! - a flat, session-lifetime key-value object, used by [`SessionStore`]
//! - an origin-private, handle-based filesystem, used by [`PrivateFsStore`]
//!
//! Neither capability is read from global state. The host passes an
//! implementation of [`SessionStorage`] or [`DirectoryHandle`] into the
//! store's constructor. [`MemorySessionStorage`] and [`MemoryDirectory`]
//! implement both contracts in memory for tests and native hosts.

pub mod error;
pub mod memory;
pub mod private_fs;
pub mod session;

pub use error::{CapabilityError, CapabilityResult};
pub use memory::{MemoryDirectory, MemoryFile, MemorySessionStorage};
pub use private_fs::{
    DirEntry, DirectoryHandle, EntryKind, FileHandle, PrivateFsStore, WritableFileStream,
};
pub use session::{SessionStorage, SessionStore};
