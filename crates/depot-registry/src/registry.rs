//! Upload and delete, keeping archives and index documents in step.
//!
//! The invariants maintained for every provider directory:
//!
//! - a version is listed in `index.json` iff `<version>.json` exists and is
//!   non-empty;
//! - every entry in a `<version>.json` names an archive file that exists.
//!
//! Both operations hold the provider's [`PathGuard`](crate::lock::PathGuard)
//! from first read to last write, which also excludes other processes
//! working on the same root. Documents are replaced atomically, so readers
//! never need the lock.

use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::filename::{is_version, parse_archive_filename, ArchiveName};
use crate::index::{ArchiveEntry, ArchiveIndex, VersionIndex, VERSION_INDEX_FILE};
use crate::lock::{PathLocks, LOCK_DIR};
use crate::path::{validate_segment, ProviderPath};
use crate::store::MetadataStore;
use crate::transfer;

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub version: String,
    pub arch: String,
    pub filename: String,
    pub bytes: u64,
    /// Recorded hashes, empty when hashing is disabled.
    pub hashes: Vec<String>,
    /// Whether an existing entry for the same arch was replaced.
    pub replaced: bool,
}

/// Result of a successful delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub filename: String,
    /// The version lost its last archive and was dropped from `index.json`.
    pub version_removed: bool,
    /// The deleted archive was the last one, so the whole directory went.
    pub directory_removed: bool,
}

/// A provider archive registry rooted at one directory.
#[derive(Debug)]
pub struct Registry {
    config: RegistryConfig,
    locks: PathLocks,
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        let locks = PathLocks::new(config.root.join(LOCK_DIR));
        Ok(Registry { config, locks })
    }

    /// Registry with default settings rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Registry::new(RegistryConfig::with_root(root))
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Directory holding `path`'s archives and documents.
    pub fn provider_dir(&self, path: &ProviderPath) -> PathBuf {
        path.resolve(&self.config.root)
    }

    fn metadata(&self, path: &ProviderPath) -> MetadataStore {
        MetadataStore::new(self.provider_dir(path))
    }

    /// Store an archive and index it under its version and arch.
    ///
    /// The filename is validated before anything touches the disk. The bytes
    /// are written in full before either document changes, then the archive
    /// index is written before the version index that points at it.
    /// Re-uploading the same version and arch replaces the previous archive.
    pub fn upload(
        &self,
        path: &ProviderPath,
        filename: &str,
        mut reader: impl Read,
    ) -> Result<UploadOutcome> {
        let name = parse_archive_filename(
            &self.config.archive_prefix,
            filename,
            path.provider_type(),
        )?;
        let dir = self.provider_dir(path);
        let _guard = self.locks.acquire(path)?;
        debug!(
            provider = %path,
            version = %name.version,
            arch = %name.arch,
            "uploading archive"
        );

        // Corrupt documents must abort before the archive is written.
        let metadata = MetadataStore::new(&dir);
        let mut versions = metadata.load_version_index()?;
        let mut archives = metadata.load_archive_index(&name.version)?;

        let stored = transfer::store(&dir, filename, &mut reader)?;
        let hashes = if self.config.record_hashes {
            vec![stored.sha256.zip_hash()]
        } else {
            Vec::new()
        };

        let entry = ArchiveEntry::new(filename).with_hashes(hashes.clone());
        let replaced = archives.insert(&name.arch, entry).is_some();
        if let Err(e) = commit_upload(&metadata, &name, &archives, &mut versions) {
            warn!(
                file = %stored.path.display(),
                error = %e,
                "archive stored but index update failed"
            );
            return Err(e);
        }

        info!(
            provider = %path,
            version = %name.version,
            arch = %name.arch,
            bytes = stored.bytes,
            "archive uploaded"
        );
        Ok(UploadOutcome {
            version: name.version,
            arch: name.arch,
            filename: filename.to_string(),
            bytes: stored.bytes,
            hashes,
            replaced,
        })
    }

    /// Upload a local file, using its file name as the archive name.
    pub fn upload_file(&self, path: &ProviderPath, file: &Path) -> Result<UploadOutcome> {
        let filename = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RegistryError::MalformedFilename {
                filename: file.display().to_string(),
                reason: "path has no UTF-8 file name".to_string(),
            })?;
        let reader = fs::File::open(file).map_err(|e| RegistryError::io(file, e))?;
        self.upload(path, filename, reader)
    }

    /// Remove the archive stored for `version` and `arch`.
    ///
    /// Empty archive indexes are deleted, and a version whose archive index
    /// goes is dropped from `index.json` (which is itself deleted once
    /// empty). Whether the directory is removed outright is decided from
    /// the archive files actually present on disk rather than from the
    /// documents: when the archive being deleted is the only one left, the
    /// whole provider directory goes.
    ///
    /// The file's presence is checked before any document changes, so a
    /// `NotFound` leaves everything as it was. A `version` that is not a
    /// version number cannot name an archive index and is `NotFound` too.
    pub fn delete(&self, path: &ProviderPath, version: &str, arch: &str) -> Result<DeleteOutcome> {
        validate_segment(version)?;
        validate_segment(arch)?;
        let not_found = || RegistryError::ArchiveNotFound {
            provider: path.to_string(),
            version: version.to_string(),
            arch: arch.to_string(),
        };
        if !is_version(version) {
            return Err(not_found());
        }
        let dir = self.provider_dir(path);
        let _guard = self.locks.acquire(path)?;
        debug!(provider = %path, version, arch, "deleting archive");

        let metadata = MetadataStore::new(&dir);
        let mut archives = metadata.find_archive_index(version)?.ok_or_else(not_found)?;
        let entry = archives.remove(arch).ok_or_else(not_found)?;
        let mut versions = metadata.load_version_index()?;

        let present = transfer::scan_archives(&dir, &self.config.archive_prefix)?;
        debug!(provider = %path, archives = ?present, "archives on disk");
        if !present.contains(&entry.filename) {
            warn!(
                provider = %path,
                file = %entry.filename,
                "indexed archive missing from disk"
            );
            return Err(RegistryError::ArchiveFileMissing {
                provider: path.to_string(),
                filename: entry.filename,
            });
        }

        let version_removed = archives.is_empty();
        if version_removed {
            metadata.delete_archive_index(version)?;
            versions.remove(version);
            if versions.is_empty() {
                metadata.delete_version_index()?;
            } else {
                metadata.save_version_index(&versions)?;
            }
        } else {
            metadata.save_archive_index(version, &archives)?;
        }

        let directory_removed = present.len() == 1;
        if directory_removed {
            transfer::remove_all(&dir)?;
        } else {
            transfer::remove(&dir, &entry.filename)?;
        }

        info!(provider = %path, version, arch, directory_removed, "archive deleted");
        Ok(DeleteOutcome {
            filename: entry.filename,
            version_removed,
            directory_removed,
        })
    }

    /// Versions listed for `path`, in ascending order.
    pub fn versions(&self, path: &ProviderPath) -> Result<Vec<String>> {
        Ok(self.metadata(path).load_version_index()?.sorted())
    }

    /// The version index of `path` as stored.
    pub fn version_index(&self, path: &ProviderPath) -> Result<VersionIndex> {
        self.metadata(path).load_version_index()
    }

    /// Archives stored for `version`.
    pub fn archives(&self, path: &ProviderPath, version: &str) -> Result<ArchiveIndex> {
        validate_segment(version)?;
        let not_found = || RegistryError::VersionNotFound {
            provider: path.to_string(),
            version: version.to_string(),
        };
        if !is_version(version) {
            return Err(not_found());
        }
        self.metadata(path)
            .find_archive_index(version)?
            .ok_or_else(not_found)
    }

    /// Every provider directory under the root that has a version index.
    pub fn providers(&self) -> Result<Vec<ProviderPath>> {
        let mut providers = Vec::new();
        for host in subdirs(&self.config.root)? {
            if host == LOCK_DIR {
                continue;
            }
            for namespace in subdirs(&self.config.root.join(&host))? {
                let ns_dir = self.config.root.join(&host).join(&namespace);
                for provider_type in subdirs(&ns_dir)? {
                    if !ns_dir.join(&provider_type).join(VERSION_INDEX_FILE).is_file() {
                        continue;
                    }
                    // Directories created by hand may not be valid segments.
                    match ProviderPath::new(&host, &namespace, &provider_type) {
                        Ok(path) => providers.push(path),
                        Err(e) => debug!(error = %e, "skipping directory"),
                    }
                }
            }
        }
        providers.sort();
        Ok(providers)
    }
}

fn commit_upload(
    metadata: &MetadataStore,
    name: &ArchiveName,
    archives: &ArchiveIndex,
    versions: &mut VersionIndex,
) -> Result<()> {
    metadata.save_archive_index(&name.version, archives)?;
    if versions.insert(&name.version) {
        metadata.save_version_index(versions)?;
    }
    Ok(())
}

/// Names of the immediate subdirectories of `dir`, sorted.
fn subdirs(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RegistryError::io(dir, e)),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RegistryError::io(dir, e))?;
        if entry.path().is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind as Kind;

    const FOO_LINUX: &str = "terraform-provider-foo_1.2.3_linux_amd64.zip";
    const FOO_DARWIN: &str = "terraform-provider-foo_1.2.3_darwin_arm64.zip";

    fn setup() -> (tempfile::TempDir, Registry, ProviderPath) {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(dir.path()).unwrap();
        let path = ProviderPath::new("registry.local", "acme", "foo").unwrap();
        (dir, registry, path)
    }

    #[test]
    fn upload_writes_all_three_artifacts() {
        let (_dir, registry, path) = setup();
        let outcome = registry.upload(&path, FOO_LINUX, &b"zip"[..]).unwrap();
        assert_eq!(outcome.version, "1.2.3");
        assert_eq!(outcome.arch, "linux_amd64");
        assert_eq!(outcome.bytes, 3);
        assert!(!outcome.replaced);
        assert_eq!(outcome.hashes.len(), 1);

        let provider_dir = registry.provider_dir(&path);
        assert!(provider_dir.join("index.json").is_file());
        assert!(provider_dir.join("1.2.3.json").is_file());
        assert_eq!(fs::read(provider_dir.join(FOO_LINUX)).unwrap(), b"zip");

        assert_eq!(registry.versions(&path).unwrap(), vec!["1.2.3"]);
        let archives = registry.archives(&path, "1.2.3").unwrap();
        assert_eq!(archives.get("linux_amd64").unwrap().filename, FOO_LINUX);
    }

    #[test]
    fn reupload_replaces_entry() {
        let (_dir, registry, path) = setup();
        registry.upload(&path, FOO_LINUX, &b"one"[..]).unwrap();
        let outcome = registry.upload(&path, FOO_LINUX, &b"two"[..]).unwrap();
        assert!(outcome.replaced);

        let archives = registry.archives(&path, "1.2.3").unwrap();
        assert_eq!(archives.len(), 1);
        let provider_dir = registry.provider_dir(&path);
        assert_eq!(fs::read(provider_dir.join(FOO_LINUX)).unwrap(), b"two");
    }

    #[test]
    fn hashes_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(RegistryConfig {
            record_hashes: false,
            ..RegistryConfig::with_root(dir.path())
        })
        .unwrap();
        let path = ProviderPath::new("h", "ns", "foo").unwrap();
        let outcome = registry.upload(&path, FOO_LINUX, &b"zip"[..]).unwrap();
        assert!(outcome.hashes.is_empty());

        let raw = fs::read_to_string(registry.provider_dir(&path).join("1.2.3.json")).unwrap();
        assert!(!raw.contains("hashes"));
    }

    #[test]
    fn invalid_upload_touches_nothing() {
        let (dir, registry, path) = setup();
        for filename in [
            "terraform-provider-bar_1.2.3_linux_amd64.zip",
            "terraform-provider-foo_1.2.3_linux_amd64.tar.gz",
            "random.zip",
        ] {
            assert!(registry.upload(&path, filename, &b"zip"[..]).is_err());
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn corrupt_index_aborts_before_archive_write() {
        let (_dir, registry, path) = setup();
        let provider_dir = registry.provider_dir(&path);
        fs::create_dir_all(&provider_dir).unwrap();
        fs::write(provider_dir.join("index.json"), b"garbage").unwrap();

        let err = registry.upload(&path, FOO_LINUX, &b"zip"[..]).unwrap_err();
        assert_eq!(err.kind(), Kind::CorruptIndex);
        assert!(!provider_dir.join(FOO_LINUX).exists());
        assert!(!provider_dir.join("1.2.3.json").exists());
    }

    #[test]
    fn delete_one_of_two_arches() {
        let (_dir, registry, path) = setup();
        registry.upload(&path, FOO_LINUX, &b"l"[..]).unwrap();
        registry.upload(&path, FOO_DARWIN, &b"d"[..]).unwrap();

        let outcome = registry.delete(&path, "1.2.3", "linux_amd64").unwrap();
        assert_eq!(outcome.filename, FOO_LINUX);
        assert!(!outcome.version_removed);
        assert!(!outcome.directory_removed);

        let provider_dir = registry.provider_dir(&path);
        assert!(!provider_dir.join(FOO_LINUX).exists());
        assert!(provider_dir.join(FOO_DARWIN).exists());
        let archives = registry.archives(&path, "1.2.3").unwrap();
        assert_eq!(archives.len(), 1);
        assert!(archives.get("darwin_arm64").is_some());
    }

    #[test]
    fn delete_last_arch_of_one_version_keeps_others() {
        let (_dir, registry, path) = setup();
        registry.upload(&path, FOO_LINUX, &b"l"[..]).unwrap();
        registry
            .upload(&path, "terraform-provider-foo_2.0.0_linux_amd64.zip", &b"n"[..])
            .unwrap();

        let outcome = registry.delete(&path, "1.2.3", "linux_amd64").unwrap();
        assert!(outcome.version_removed);
        assert!(!outcome.directory_removed);

        let provider_dir = registry.provider_dir(&path);
        assert!(!provider_dir.join("1.2.3.json").exists());
        assert_eq!(registry.versions(&path).unwrap(), vec!["2.0.0"]);
        assert_eq!(
            registry.archives(&path, "1.2.3").unwrap_err().kind(),
            Kind::NotFound
        );
    }

    #[test]
    fn delete_last_archive_removes_directory() {
        let (_dir, registry, path) = setup();
        registry.upload(&path, FOO_LINUX, &b"l"[..]).unwrap();

        let outcome = registry.delete(&path, "1.2.3", "linux_amd64").unwrap();
        assert!(outcome.version_removed);
        assert!(outcome.directory_removed);
        assert!(!registry.provider_dir(&path).exists());
        assert!(registry.versions(&path).unwrap().is_empty());
    }

    #[test]
    fn delete_unknown_is_not_found() {
        let (_dir, registry, path) = setup();
        registry.upload(&path, FOO_LINUX, &b"l"[..]).unwrap();

        for (version, arch) in [("1.2.3", "windows_amd64"), ("9.9.9", "linux_amd64")] {
            let err = registry.delete(&path, version, arch).unwrap_err();
            assert_eq!(err.kind(), Kind::NotFound);
        }
    }

    #[test]
    fn delete_with_missing_file_mutates_nothing() {
        let (_dir, registry, path) = setup();
        registry.upload(&path, FOO_LINUX, &b"l"[..]).unwrap();
        registry.upload(&path, FOO_DARWIN, &b"d"[..]).unwrap();
        let provider_dir = registry.provider_dir(&path);
        fs::remove_file(provider_dir.join(FOO_LINUX)).unwrap();
        let before = fs::read(provider_dir.join("1.2.3.json")).unwrap();

        let err = registry.delete(&path, "1.2.3", "linux_amd64").unwrap_err();
        assert!(matches!(err, RegistryError::ArchiveFileMissing { .. }));
        assert_eq!(fs::read(provider_dir.join("1.2.3.json")).unwrap(), before);
        assert!(provider_dir.join(FOO_DARWIN).exists());
    }

    #[test]
    fn delete_rejects_traversal() {
        let (_dir, registry, path) = setup();
        let err = registry.delete(&path, "../../etc", "x").unwrap_err();
        assert_eq!(err.kind(), Kind::InvalidSegment);
    }

    #[test]
    fn non_version_is_never_read_as_a_document() {
        let (_dir, registry, path) = setup();
        registry.upload(&path, FOO_LINUX, &b"l"[..]).unwrap();
        let index = registry.provider_dir(&path).join("index.json");
        let before = fs::read(&index).unwrap();

        for version in ["index", "latest", "1.2.3-rc1"] {
            let err = registry.delete(&path, version, "linux_amd64").unwrap_err();
            assert!(matches!(err, RegistryError::ArchiveNotFound { .. }), "{err}");
            assert_eq!(err.status_code(), 404);

            let err = registry.archives(&path, version).unwrap_err();
            assert!(matches!(err, RegistryError::VersionNotFound { .. }), "{err}");
        }
        assert_eq!(fs::read(&index).unwrap(), before);
    }

    #[test]
    fn lock_files_survive_directory_removal() {
        let (dir, registry, path) = setup();
        registry.upload(&path, FOO_LINUX, &b"l"[..]).unwrap();
        registry.delete(&path, "1.2.3", "linux_amd64").unwrap();

        assert!(!registry.provider_dir(&path).exists());
        assert!(dir.path().join(".locks/registry.local/acme/foo.lock").is_file());
        assert!(registry.providers().unwrap().is_empty());
    }

    #[test]
    fn upload_file_uses_file_name() {
        let (dir, registry, path) = setup();
        let local = dir.path().join(FOO_DARWIN);
        fs::write(&local, b"local bytes").unwrap();
        let outcome = registry.upload_file(&path, &local).unwrap();
        assert_eq!(outcome.arch, "darwin_arm64");
        assert_eq!(outcome.bytes, 11);
    }

    #[test]
    fn lists_providers() {
        let (_dir, registry, path) = setup();
        registry.upload(&path, FOO_LINUX, &b"l"[..]).unwrap();
        let other = ProviderPath::new("registry.local", "zeta", "baz").unwrap();
        registry
            .upload(&other, "terraform-provider-baz_0.1_linux_amd64.zip", &b"b"[..])
            .unwrap();
        fs::create_dir_all(registry.root().join("h/ns/empty")).unwrap();

        assert_eq!(registry.providers().unwrap(), vec![path, other]);
    }
}
