//! The two tiers of JSON index documents.
//!
//! `index.json` lists the versions of a provider:
//!
//! ```json
//! {"versions": {"1.2.3": {}}}
//! ```
//!
//! `<version>.json` lists the archives of one version, keyed by `os_arch`:
//!
//! ```json
//! {"archives": {"linux_amd64": {"url": "terraform-provider-foo_1.2.3_linux_amd64.zip"}}}
//! ```
//!
//! Both use `BTreeMap` so serialization is stable. Entry fields this crate
//! does not know about (such as `protocols`) are carried through rewrites.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// File name of the version index inside a provider directory.
pub const VERSION_INDEX_FILE: &str = "index.json";

/// File name of the archive index for `version`.
pub fn archive_index_file(version: &str) -> String {
    format!("{version}.json")
}

/// Versions of one provider that have at least one stored archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionIndex {
    pub versions: BTreeMap<String, VersionEntry>,
}

/// Per-version entry in the version index. Empty when written by us.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl VersionIndex {
    /// Add a version. Returns `false` if it was already listed, in which
    /// case its entry is left as it was.
    pub fn insert(&mut self, version: &str) -> bool {
        if self.versions.contains_key(version) {
            return false;
        }
        self.versions.insert(version.to_string(), VersionEntry::default());
        true
    }

    /// Remove a version. Returns `false` if it was not listed.
    pub fn remove(&mut self, version: &str) -> bool {
        self.versions.remove(version).is_some()
    }

    pub fn contains(&self, version: &str) -> bool {
        self.versions.contains_key(version)
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Versions in ascending numeric order (`1.9.0` before `1.10.0`).
    pub fn sorted(&self) -> Vec<String> {
        let mut versions: Vec<String> = self.versions.keys().cloned().collect();
        versions.sort_by(|a, b| compare_versions(a, b));
        versions
    }
}

/// Archives stored for one version, keyed by `os_arch`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveIndex {
    pub archives: BTreeMap<String, ArchiveEntry>,
}

/// One stored archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Archive file name, relative to the provider directory.
    #[serde(rename = "url")]
    pub filename: String,
    /// Hash strings such as `zh:<sha256>`, omitted when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hashes: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ArchiveEntry {
    pub fn new(filename: impl Into<String>) -> Self {
        ArchiveEntry {
            filename: filename.into(),
            hashes: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_hashes(mut self, hashes: Vec<String>) -> Self {
        self.hashes = hashes;
        self
    }
}

impl ArchiveIndex {
    /// Insert or overwrite the entry for `arch`, returning the previous one.
    pub fn insert(&mut self, arch: &str, entry: ArchiveEntry) -> Option<ArchiveEntry> {
        self.archives.insert(arch.to_string(), entry)
    }

    pub fn remove(&mut self, arch: &str) -> Option<ArchiveEntry> {
        self.archives.remove(arch)
    }

    pub fn get(&self, arch: &str) -> Option<&ArchiveEntry> {
        self.archives.get(arch)
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }

    pub fn len(&self) -> usize {
        self.archives.len()
    }

    /// Iterate `(arch, entry)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArchiveEntry)> {
        self.archives.iter().map(|(arch, entry)| (arch.as_str(), entry))
    }
}

/// Order version strings by their numeric components.
///
/// Components that do not parse as numbers fall back to string order.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}
