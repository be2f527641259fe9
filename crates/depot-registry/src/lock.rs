//! Per-provider mutual exclusion.
//!
//! Uploads and deletes read, modify and rewrite the index documents of one
//! provider directory. Two such sequences interleaving on the same provider
//! would lose one update, so each holds a [`PathGuard`] until it is done.
//!
//! The guard is an exclusive advisory lock on
//! `<root>/.locks/<host>/<namespace>/<type>.lock`, which serializes every
//! process working on the same root. Lock files sit outside the provider
//! directories so removing a provider never deletes a lock someone is
//! waiting on. Threads of one process first queue on an in-memory claim and
//! only then take the file lock.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use fs4::FileExt;
use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::path::ProviderPath;

/// Directory under the registry root that holds lock files.
pub const LOCK_DIR: &str = ".locks";

/// Provider locks for one registry root.
#[derive(Debug)]
pub struct PathLocks {
    dir: PathBuf,
    held: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

/// Exclusive hold on one provider, released on drop.
#[derive(Debug)]
pub struct PathGuard<'a> {
    // Dropped before the claim: closing the file releases the OS lock.
    _file: File,
    claim: Claim<'a>,
}

#[derive(Debug)]
struct Claim<'a> {
    locks: &'a PathLocks,
    key: PathBuf,
}

impl PathLocks {
    /// Locks whose files live under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        PathLocks {
            dir: dir.into(),
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }

    pub fn lock_path(&self, provider: &ProviderPath) -> PathBuf {
        self.dir
            .join(provider.host())
            .join(provider.namespace())
            .join(format!("{}.lock", provider.provider_type()))
    }

    /// Block until no thread or process holds `provider`, then hold it.
    pub fn acquire(&self, provider: &ProviderPath) -> Result<PathGuard<'_>> {
        let key = self.lock_path(provider);
        let claim = self.claim(&key);
        let file = open_lock_file(&key)?;
        file.lock_exclusive()
            .map_err(|e| RegistryError::io(&key, e))?;
        debug!(lock = %key.display(), "acquired provider lock");
        Ok(PathGuard { _file: file, claim })
    }

    /// Whether a thread of this process holds `provider`.
    pub fn is_held(&self, provider: &ProviderPath) -> bool {
        self.held_set().contains(&self.lock_path(provider))
    }

    fn claim(&self, key: &Path) -> Claim<'_> {
        let mut held = self.held_set();
        while held.contains(key) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(key.to_path_buf());
        Claim {
            locks: self,
            key: key.to_path_buf(),
        }
    }

    // The set is only mutated by insert/remove, so a poisoned lock still
    // holds a consistent set.
    fn held_set(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PathGuard<'_> {
    /// The lock file backing this guard.
    pub fn path(&self) -> &Path {
        &self.claim.key
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.locks.held_set().remove(&self.key);
        self.locks.released.notify_all();
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RegistryError::write(parent, e))?;
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| RegistryError::io(path, e))
}
