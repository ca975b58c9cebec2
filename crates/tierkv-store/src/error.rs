use std::path::PathBuf;

use crate::traits::BackendKind;

/// Boxed cause carried by medium failures from hosted backends.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from string store operations.
///
/// A missing key is never an error: `get` reports it as `Ok(None)` and
/// `delete` as `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key is rejected by the backend's key allow-list.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// The scope identifier is empty or otherwise unusable.
    #[error("invalid scope {scope:?}: {reason}")]
    InvalidScope { scope: String, reason: String },

    /// The directory a directory-backed store is rooted at does not exist.
    #[error("store root does not exist: {}", .0.display())]
    MissingRoot(PathBuf),

    /// I/O failure from the local filesystem.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored value could not be decoded as UTF-8 text.
    #[error("value for key {key:?} is not valid UTF-8")]
    InvalidUtf8 { key: String },

    /// The backing medium refused the write for lack of space.
    #[error("{backend} quota exceeded writing key {key:?}")]
    QuotaExceeded { backend: BackendKind, key: String },

    /// Failure reported by a hosted medium, with the original cause attached.
    #[error("{backend} medium failure: {source}")]
    Medium {
        backend: BackendKind,
        #[source]
        source: BoxError,
    },

    /// An internal lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    Poisoned(String),

    /// The backend cannot serve requests in the current environment.
    #[error("{backend} unavailable: {reason}")]
    Unavailable { backend: BackendKind, reason: String },
}

impl StoreError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a hosted medium failure.
    pub fn medium(backend: BackendKind, source: impl Into<BoxError>) -> Self {
        Self::Medium {
            backend,
            source: source.into(),
        }
    }

    /// Returns `true` for caller mistakes (bad key or scope) rather than
    /// failures of the backing medium.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidKey { .. } | Self::InvalidScope { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_keeps_cause() {
        let err = StoreError::io(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        );
        let source = std::error::Error::source(&err).expect("has source");
        assert!(source.to_string().contains("nope"));
        assert!(err.to_string().contains("/tmp/x"));
    }

    #[test]
    fn invalid_input_classification() {
        let key = StoreError::InvalidKey {
            key: "../x".into(),
            reason: "bad".into(),
        };
        assert!(key.is_invalid_input());
        assert!(!StoreError::MissingRoot(PathBuf::from("/nowhere")).is_invalid_input());
    }
}
