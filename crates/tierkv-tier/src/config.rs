use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use tierkv_store::{priority, validate_scope, BackendKind, Priority};

use crate::error::{TierError, TierResult};

/// Scope used when none is configured.
pub const DEFAULT_SCOPE: &str = "default";

/// Settings for assembling and composing tiers.
///
/// ```toml
/// scope = "app"
/// directory = "/var/lib/app"
/// read_repair = true
///
/// [priorities]
/// directory = 50
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TierConfig {
    /// Namespace shared by every tier.
    pub scope: String,
    /// Base directory for the directory tier; the tier's root is
    /// `<directory>/<scope>`. No directory tier when unset.
    pub directory: Option<PathBuf>,
    /// Write a found value back into the tiers that missed it during a read.
    pub read_repair: bool,
    /// Per-backend priority weights.
    pub priorities: PriorityConfig,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            scope: DEFAULT_SCOPE.to_string(),
            directory: None,
            read_repair: true,
            priorities: PriorityConfig::default(),
        }
    }
}

impl TierConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> TierResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| TierError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text).map_err(|source| TierError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can be assembled.
    pub fn validate(&self) -> TierResult<()> {
        validate_scope(&self.scope).map_err(|e| TierError::Config(e.to_string()))?;
        if let Some(dir) = &self.directory {
            if dir.as_os_str().is_empty() {
                return Err(TierError::Config("directory must not be empty".into()));
            }
        }
        Ok(())
    }
}

/// Priority weight per backend. Higher is preferred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PriorityConfig {
    pub table: Priority,
    pub session: Priority,
    pub private_fs: Priority,
    pub directory: Priority,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            table: priority::TABLE,
            session: priority::SESSION,
            private_fs: priority::PRIVATE_FS,
            directory: priority::DIRECTORY,
        }
    }
}

impl PriorityConfig {
    /// Weight configured for `backend`.
    pub fn for_backend(&self, backend: BackendKind) -> Priority {
        match backend {
            BackendKind::Table | BackendKind::Tiered => self.table,
            BackendKind::Session => self.session,
            BackendKind::PrivateFs => self.private_fs,
            BackendKind::Directory => self.directory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = TierConfig::default();
        assert_eq!(c.scope, "default");
        assert!(c.directory.is_none());
        assert!(c.read_repair);
        assert_eq!(c.priorities.directory, priority::DIRECTORY);
        c.validate().unwrap();
    }

    #[test]
    fn parse_partial_toml() {
        let c = TierConfig::from_toml_str(
            r#"
            scope = "app"
            directory = "/var/lib/app"

            [priorities]
            directory = 50
            "#,
        )
        .unwrap();
        assert_eq!(c.scope, "app");
        assert_eq!(c.directory, Some(PathBuf::from("/var/lib/app")));
        assert!(c.read_repair);
        assert_eq!(c.priorities.directory, 50);
        assert_eq!(c.priorities.table, priority::TABLE);
        assert_eq!(c.priorities.for_backend(BackendKind::Directory), 50);
    }

    #[test]
    fn reject_unknown_fields() {
        assert!(TierConfig::from_toml_str("scopes = \"typo\"").is_err());
    }

    #[test]
    fn validate_rejects_bad_scope() {
        let c = TierConfig {
            scope: "has/slash".into(),
            ..TierConfig::default()
        };
        assert!(matches!(c.validate(), Err(TierError::Config(_))));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tierkv.toml");
        std::fs::write(&path, "scope = \"cfg\"\nread_repair = false\n").unwrap();

        let c = TierConfig::load(&path).unwrap();
        assert_eq!(c.scope, "cfg");
        assert!(!c.read_repair);

        std::fs::write(&path, "scope = 3").unwrap();
        assert!(matches!(TierConfig::load(&path), Err(TierError::Toml { .. })));
        assert!(matches!(
            TierConfig::load(&dir.path().join("missing.toml")),
            Err(TierError::Io { .. })
        ));
    }

    #[test]
    fn serializes_back_to_toml() {
        let c = TierConfig {
            scope: "app".into(),
            directory: Some(PathBuf::from("/data")),
            ..TierConfig::default()
        };
        let text = toml::to_string(&c).unwrap();
        assert_eq!(TierConfig::from_toml_str(&text).unwrap(), c);
    }
}
