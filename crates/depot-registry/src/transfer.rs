//! Moving archive bytes on and off disk.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::filename::is_archive_filename;
use crate::integrity::{ContentHash, HashingWriter};
use crate::store::write_atomic;

/// A fully written archive file.
#[derive(Debug, Clone)]
pub struct StoredArchive {
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: ContentHash,
}

/// Stream `reader` into `<dir>/<filename>`, creating `dir` as needed.
///
/// Bytes land in a temp file that is synced and renamed over the target only
/// once the stream is exhausted, so a failed transfer leaves any previous
/// file of the same name untouched.
pub fn store(dir: &Path, filename: &str, reader: &mut impl Read) -> Result<StoredArchive> {
    let path = dir.join(filename);
    fs::create_dir_all(dir).map_err(|e| RegistryError::write(dir, e))?;

    let (sha256, bytes) = write_atomic(&path, |file| {
        let mut writer = HashingWriter::new(file);
        io::copy(reader, &mut writer)?;
        let (_, sha256, bytes) = writer.finish();
        Ok((sha256, bytes))
    })?;

    debug!(file = %path.display(), bytes, "stored archive");
    Ok(StoredArchive {
        path,
        bytes,
        sha256,
    })
}

/// Delete `<dir>/<filename>`.
pub fn remove(dir: &Path, filename: &str) -> Result<()> {
    let path = dir.join(filename);
    fs::remove_file(&path).map_err(|e| RegistryError::io(&path, e))?;
    debug!(file = %path.display(), "removed archive");
    Ok(())
}

/// Delete `dir` and everything below it.
pub fn remove_all(dir: &Path) -> Result<()> {
    fs::remove_dir_all(dir).map_err(|e| RegistryError::io(dir, e))?;
    debug!(dir = %dir.display(), "removed provider directory");
    Ok(())
}

/// Names of the archive files physically present in `dir`.
///
/// A missing directory has no archives.
pub fn scan_archives(dir: &Path, prefix: &str) -> Result<BTreeSet<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => return Err(RegistryError::io(dir, e)),
    };

    let mut archives = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|e| RegistryError::io(dir, e))?;
        let is_file = entry
            .file_type()
            .map_err(|e| RegistryError::io(entry.path(), e))?
            .is_file();
        if !is_file {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if is_archive_filename(prefix, name) {
                archives.insert(name.to_string());
            }
        }
    }
    Ok(archives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind as Kind;

    const PREFIX: &str = "terraform-provider";

    /// Yields some bytes, then fails.
    struct BrokenReader {
        sent: bool,
    }

    impl Read for BrokenReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::new(ErrorKind::ConnectionReset, "client went away"));
            }
            self.sent = true;
            buf[..4].copy_from_slice(b"part");
            Ok(4)
        }
    }

    #[test]
    fn store_creates_directories_and_hashes() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("h/ns/foo");
        let stored = store(&dir, "a.zip", &mut &b"zip bytes"[..]).unwrap();

        assert_eq!(stored.bytes, 9);
        assert_eq!(
            stored.sha256,
            ContentHash::read_from(&mut &b"zip bytes"[..]).unwrap()
        );
        assert_eq!(fs::read(dir.join("a.zip")).unwrap(), b"zip bytes");
    }

    #[test]
    fn store_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        store(dir.path(), "a.zip", &mut &b"old"[..]).unwrap();
        store(dir.path(), "a.zip", &mut &b"new"[..]).unwrap();
        assert_eq!(fs::read(dir.path().join("a.zip")).unwrap(), b"new");
    }

    #[test]
    fn failed_stream_leaves_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        store(dir.path(), "a.zip", &mut &b"good"[..]).unwrap();

        let err = store(dir.path(), "a.zip", &mut BrokenReader { sent: false }).unwrap_err();
        assert_eq!(err.kind(), Kind::StorageWrite);
        assert_eq!(fs::read(dir.path().join("a.zip")).unwrap(), b"good");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn remove_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = remove(dir.path(), "nope.zip").unwrap_err();
        assert_eq!(err.kind(), Kind::StorageIo);
    }

    #[test]
    fn remove_all_drops_tree() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("h/ns/foo");
        store(&dir, "a.zip", &mut &b"x"[..]).unwrap();
        remove_all(&dir).unwrap();
        assert!(!dir.exists());
        assert!(root.path().join("h/ns").is_dir());
    }

    #[test]
    fn scan_only_sees_archives() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "terraform-provider-foo_1.0_linux_amd64.zip",
            "terraform-provider-foo_1.1_darwin_arm64.zip",
            "index.json",
            "1.0.json",
            "notes.txt",
            "terraform-provider-foo_1.0_linux_amd64.tar.gz",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("terraform-provider-foo_9.9_dir_x.zip")).unwrap();

        let found = scan_archives(dir.path(), PREFIX).unwrap();
        let found: Vec<&str> = found.iter().map(String::as_str).collect();
        assert_eq!(
            found,
            vec![
                "terraform-provider-foo_1.0_linux_amd64.zip",
                "terraform-provider-foo_1.1_darwin_arm64.zip",
            ]
        );
    }

    #[test]
    fn scan_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_archives(&dir.path().join("gone"), PREFIX)
            .unwrap()
            .is_empty());
    }
}
