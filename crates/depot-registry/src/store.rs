//! Reading and atomically replacing index documents.
//!
//! Every write goes to a temporary file in the provider directory, is
//! flushed to disk, and is then renamed over the target. Readers therefore
//! see either the previous document or the new one, never a partial write,
//! and may read without taking the directory lock.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::index::{archive_index_file, ArchiveIndex, VersionIndex, VERSION_INDEX_FILE};

/// Index documents of one provider directory.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    dir: PathBuf,
}

impl MetadataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        MetadataStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn version_index_path(&self) -> PathBuf {
        self.dir.join(VERSION_INDEX_FILE)
    }

    pub fn archive_index_path(&self, version: &str) -> PathBuf {
        self.dir.join(archive_index_file(version))
    }

    /// Load `index.json`, or an empty index if it does not exist.
    pub fn load_version_index(&self) -> Result<VersionIndex> {
        Ok(read_document(&self.version_index_path())?.unwrap_or_default())
    }

    pub fn save_version_index(&self, index: &VersionIndex) -> Result<()> {
        write_document(&self.version_index_path(), index)
    }

    /// Remove `index.json`. Absent is fine.
    pub fn delete_version_index(&self) -> Result<()> {
        remove_document(&self.version_index_path())
    }

    /// Load `<version>.json`, or an empty index if it does not exist.
    pub fn load_archive_index(&self, version: &str) -> Result<ArchiveIndex> {
        Ok(self.find_archive_index(version)?.unwrap_or_default())
    }

    /// Load `<version>.json`, `None` if it does not exist.
    pub fn find_archive_index(&self, version: &str) -> Result<Option<ArchiveIndex>> {
        read_document(&self.archive_index_path(version))
    }

    pub fn save_archive_index(&self, version: &str, index: &ArchiveIndex) -> Result<()> {
        write_document(&self.archive_index_path(version), index)
    }

    /// Remove `<version>.json`. Absent is fine.
    pub fn delete_archive_index(&self, version: &str) -> Result<()> {
        remove_document(&self.archive_index_path(version))
    }
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(RegistryError::io(path, e)),
    };
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|source| RegistryError::CorruptIndex {
            path: path.to_path_buf(),
            source,
        })
}

fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut data = serde_json::to_vec_pretty(value).map_err(|source| {
        RegistryError::CorruptIndex {
            path: path.to_path_buf(),
            source,
        }
    })?;
    data.push(b'\n');
    write_atomic(path, |file| file.write_all(&data))?;
    debug!(path = %path.display(), "updated index document");
    Ok(())
}

fn remove_document(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed index document");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RegistryError::io(path, e)),
    }
}

/// Replace `path` with whatever `fill` writes, via a synced temp file in the
/// same directory and a rename. If `fill` fails the temp file is discarded
/// and `path` keeps its previous contents.
pub(crate) fn write_atomic<T>(
    path: &Path,
    fill: impl FnOnce(&mut fs::File) -> io::Result<T>,
) -> Result<T> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| RegistryError::write(path, e))?;
    let value = fill(tmp.as_file_mut()).map_err(|e| RegistryError::write(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| RegistryError::write(path, e))?;
    tmp.persist(path)
        .map_err(|e| RegistryError::write(path, e.error))?;
    sync_dir(dir);
    Ok(value)
}

/// Flush a directory entry so a completed rename survives a crash.
/// Best effort: not every platform can open a directory for syncing.
fn sync_dir(dir: &Path) {
    if let Ok(handle) = fs::File::open(dir) {
        let _ = handle.sync_all();
    }
}
