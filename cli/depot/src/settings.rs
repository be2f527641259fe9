//! `depot.toml` configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use depot_registry::RegistryConfig;
use serde::{Deserialize, Serialize};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "depot.toml";

/// The top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Storage settings passed to the registry.
    pub registry: RegistryConfig,
    /// Logging settings.
    pub log: LogConfig,
}

/// `[log]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. `info`, `depot_registry=debug`).
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Parse settings from a TOML string.
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing depot configuration")
    }

    /// Load settings from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Load `explicit` if given, else `depot.toml` in `cwd` if present, else defaults.
    pub fn resolve(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = cwd.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply the `--dir` override.
    pub fn with_root(mut self, root: Option<PathBuf>) -> Self {
        if let Some(root) = root {
            self.registry.root = root;
        }
        self
    }

    /// Render the effective settings as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serializing depot configuration")
    }
}
