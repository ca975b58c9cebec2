use std::path::PathBuf;

use thiserror::Error;

/// Errors from configuration loading and tier assembly.
#[derive(Debug, Error)]
pub enum TierError {
    /// The configuration is well-formed but unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// The configuration file is not valid TOML for [`TierConfig`](crate::TierConfig).
    #[error("invalid configuration in {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The configuration file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A store operation failed.
    #[error("store error: {0}")]
    Store(#[from] tierkv_store::StoreError),
}

/// Result alias for tier operations.
pub type TierResult<T> = Result<T, TierError>;
