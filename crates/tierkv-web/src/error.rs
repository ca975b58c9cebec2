//! Errors reported by host-provided storage capabilities.

use thiserror::Error;

use tierkv_store::{BackendKind, StoreError};

/// Failure raised by a host capability (session storage object or
/// private-filesystem handle).
///
/// Only [`CapabilityError::NotFound`] means "genuinely missing"; every other
/// variant is a medium failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    /// The named entry does not exist.
    #[error("entry not found: {0}")]
    NotFound(String),

    /// The entry exists but is of the wrong kind (file vs directory).
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// The host refused the write for lack of space.
    #[error("quota exceeded")]
    QuotaExceeded,

    /// The host denied access (privacy mode, policy, sandboxing).
    #[error("access denied: {0}")]
    Security(String),

    /// The host does not implement the requested operation.
    #[error("operation not supported: {0}")]
    NotSupported(String),

    /// Any other host failure.
    #[error("{0}")]
    Other(String),
}

impl CapabilityError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Convert into a [`StoreError`] for an operation on `key`, keeping this
    /// error as the cause.
    pub fn into_store_error(self, backend: BackendKind, key: &str) -> StoreError {
        match self {
            Self::QuotaExceeded => StoreError::QuotaExceeded {
                backend,
                key: key.to_string(),
            },
            other => StoreError::medium(backend, other),
        }
    }
}

/// Result alias for host capability calls.
pub type CapabilityResult<T> = Result<T, CapabilityError>;
