//! Read-only consistency audit of a provider directory.
//!
//! Compares the index documents against each other and against the archive
//! files on disk, and re-hashes archives that carry a `zh:` hash.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{RegistryError, Result};
use crate::filename::is_version;
use crate::index::VERSION_INDEX_FILE;
use crate::integrity::ContentHash;
use crate::path::ProviderPath;
use crate::registry::Registry;
use crate::store::MetadataStore;
use crate::transfer;

/// A single inconsistency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    /// Listed in `index.json` without a `<version>.json`.
    DanglingVersion { version: String },
    /// `<version>.json` exists but the version is not listed.
    UnlistedVersion { version: String },
    /// `<version>.json` has no archives.
    EmptyArchiveIndex { version: String },
    /// An entry names a file that is not on disk.
    MissingFile {
        version: String,
        arch: String,
        filename: String,
    },
    /// An archive file no entry refers to.
    OrphanFile { filename: String },
    /// The file's SHA-256 differs from the recorded `zh:` hash.
    HashMismatch {
        filename: String,
        expected: String,
        actual: String,
    },
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::DanglingVersion { version } => {
                write!(f, "version {version} is listed but has no archive index")
            }
            Issue::UnlistedVersion { version } => {
                write!(f, "archive index {version}.json is not listed in {VERSION_INDEX_FILE}")
            }
            Issue::EmptyArchiveIndex { version } => {
                write!(f, "archive index {version}.json is empty")
            }
            Issue::MissingFile {
                version,
                arch,
                filename,
            } => write!(f, "{version}/{arch} refers to missing file {filename}"),
            Issue::OrphanFile { filename } => {
                write!(f, "archive {filename} is not referenced by any index")
            }
            Issue::HashMismatch {
                filename,
                expected,
                actual,
            } => write!(f, "{filename}: expected zh:{expected}, found zh:{actual}"),
        }
    }
}

/// Outcome of checking one provider.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub provider: ProviderPath,
    pub versions_checked: usize,
    pub archives_checked: usize,
    pub issues: Vec<Issue>,
}

impl CheckReport {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }
}

impl Registry {
    /// Audit `path` without modifying anything.
    pub fn check(&self, path: &ProviderPath) -> Result<CheckReport> {
        let dir = self.provider_dir(path);
        let metadata = MetadataStore::new(&dir);
        let versions = metadata.load_version_index()?;
        let files = transfer::scan_archives(&dir, &self.config().archive_prefix)?;

        let mut issues = Vec::new();
        let mut referenced = BTreeSet::new();
        let mut archives_checked = 0;

        for version in versions.sorted() {
            let Some(archives) = metadata.find_archive_index(&version)? else {
                issues.push(Issue::DanglingVersion { version });
                continue;
            };
            if archives.is_empty() {
                issues.push(Issue::EmptyArchiveIndex {
                    version: version.clone(),
                });
            }
            for (arch, entry) in archives.iter() {
                archives_checked += 1;
                referenced.insert(entry.filename.clone());
                if !files.contains(&entry.filename) {
                    issues.push(Issue::MissingFile {
                        version: version.clone(),
                        arch: arch.to_string(),
                        filename: entry.filename.clone(),
                    });
                    continue;
                }
                let recorded = entry
                    .hashes
                    .iter()
                    .filter_map(|h| ContentHash::parse_zip_hash(h));
                for expected in recorded {
                    let actual = hash_file(&dir.join(&entry.filename))?;
                    if actual != expected {
                        issues.push(Issue::HashMismatch {
                            filename: entry.filename.clone(),
                            expected: expected.into_hex(),
                            actual: actual.into_hex(),
                        });
                    }
                }
            }
        }

        for version in archive_index_versions(&dir)? {
            if !versions.contains(&version) {
                issues.push(Issue::UnlistedVersion { version });
            }
        }

        for filename in files.difference(&referenced) {
            issues.push(Issue::OrphanFile {
                filename: filename.clone(),
            });
        }

        Ok(CheckReport {
            provider: path.clone(),
            versions_checked: versions.len(),
            archives_checked,
            issues,
        })
    }

    /// Audit every provider under the root.
    pub fn check_all(&self) -> Result<Vec<CheckReport>> {
        self.providers()?
            .iter()
            .map(|path| self.check(path))
            .collect()
    }
}

/// Format a report for terminal display.
pub fn format_report(report: &CheckReport) -> String {
    let mut out = format!(
        "{}: {} versions, {} archives",
        report.provider, report.versions_checked, report.archives_checked
    );
    if report.is_consistent() {
        out.push_str(", consistent\n");
    } else {
        out.push_str(&format!(", {} issue(s)\n", report.issues.len()));
        for issue in &report.issues {
            out.push_str(&format!("  - {issue}\n"));
        }
    }
    out
}

fn hash_file(path: &Path) -> Result<ContentHash> {
    let mut file = fs::File::open(path).map_err(|e| RegistryError::io(path, e))?;
    ContentHash::read_from(&mut file).map_err(|e| RegistryError::io(path, e))
}

/// Versions that have a `<version>.json` in `dir`.
fn archive_index_versions(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RegistryError::io(dir, e)),
    };
    let mut versions = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RegistryError::io(dir, e))?;
        let name = entry.file_name();
        let Some(version) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
            continue;
        };
        if is_version(version) {
            versions.push(version.to_string());
        }
    }
    versions.sort();
    Ok(versions)
}
