//! Registry configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};

/// Directory used when none is configured.
pub const DEFAULT_ROOT: &str = "providers";

/// Archive filename prefix used when none is configured.
pub const DEFAULT_ARCHIVE_PREFIX: &str = "terraform-provider";

/// Settings for a [`Registry`](crate::Registry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directory under which `<host>/<namespace>/<type>` trees live.
    pub root: PathBuf,
    /// Leading `<prefix>-` every archive filename carries.
    pub archive_prefix: String,
    /// Record a `zh:` SHA-256 for each uploaded archive.
    pub record_hashes: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            root: PathBuf::from(DEFAULT_ROOT),
            archive_prefix: DEFAULT_ARCHIVE_PREFIX.to_string(),
            record_hashes: true,
        }
    }
}

impl RegistryConfig {
    /// Default settings rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        RegistryConfig {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(RegistryError::Config {
                detail: "root directory must not be empty".to_string(),
            });
        }
        let prefix_ok = !self.archive_prefix.is_empty()
            && self
                .archive_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !prefix_ok {
            return Err(RegistryError::Config {
                detail: format!(
                    "archive prefix '{}' must be non-empty [A-Za-z0-9_-]",
                    self.archive_prefix
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.root, PathBuf::from("providers"));
        assert_eq!(config.archive_prefix, "terraform-provider");
        assert!(config.record_hashes);
        config.validate().unwrap();
    }

    #[test]
    fn partial_document_fills_defaults() {
        let config: RegistryConfig = serde_json::from_str(r#"{"root": "/srv/mirror"}"#).unwrap();
        assert_eq!(config.root, PathBuf::from("/srv/mirror"));
        assert_eq!(config.archive_prefix, DEFAULT_ARCHIVE_PREFIX);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(RegistryConfig::with_root("").validate().is_err());

        let config = RegistryConfig {
            archive_prefix: "../x".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RegistryConfig {
            archive_prefix: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
