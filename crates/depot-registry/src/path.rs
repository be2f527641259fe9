//! Provider path resolution.
//!
//! A [`ProviderPath`] names one storage directory:
//!
//! ```text
//! <root>/<host>/<namespace>/<type>/
//!   index.json
//!   <version>.json
//!   <prefix>-<type>_<version>_<arch>.zip
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{RegistryError, Result};

/// Identifies the directory holding every archive of one provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderPath {
    host: String,
    namespace: String,
    provider_type: String,
}

impl ProviderPath {
    /// Build a provider path, rejecting segments that are unsafe on disk.
    pub fn new(
        host: impl Into<String>,
        namespace: impl Into<String>,
        provider_type: impl Into<String>,
    ) -> Result<Self> {
        let path = ProviderPath {
            host: host.into(),
            namespace: namespace.into(),
            provider_type: provider_type.into(),
        };
        validate_segment(&path.host)?;
        validate_segment(&path.namespace)?;
        validate_segment(&path.provider_type)?;
        Ok(path)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The provider type, which uploaded filenames must name.
    pub fn provider_type(&self) -> &str {
        &self.provider_type
    }

    /// Directory for this provider under `root`.
    pub fn resolve(&self, root: &Path) -> PathBuf {
        root.join(&self.host)
            .join(&self.namespace)
            .join(&self.provider_type)
    }
}

impl fmt::Display for ProviderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.host, self.namespace, self.provider_type)
    }
}

/// Resolve the directory for a `(host, namespace, type)` triple.
pub fn resolve_path(
    root: &Path,
    host: &str,
    namespace: &str,
    provider_type: &str,
) -> Result<PathBuf> {
    Ok(ProviderPath::new(host, namespace, provider_type)?.resolve(root))
}

/// Check that `segment` is a single, traversal-free path component.
///
/// Accepts ASCII alphanumerics plus `.`, `_` and `-`; rejects empty
/// segments, `.` and `..`.
pub fn validate_segment(segment: &str) -> Result<()> {
    let reason = if segment.is_empty() {
        Some("segment is empty")
    } else if segment == "." || segment == ".." {
        Some("relative directory reference")
    } else if !segment.chars().all(is_segment_char) {
        Some("only ASCII letters, digits, '.', '_' and '-' are allowed")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(RegistryError::InvalidSegment {
            segment: segment.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}
