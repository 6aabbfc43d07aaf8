//! Run-scoped registry of filenames claimed in the output directory.
//!
//! The registry holds every name that exists on disk in the output directory
//! plus every name reserved by an in-flight download. Uniqueness is decided
//! here, in memory, under one lock; the filesystem is only consulted once when
//! the registry is seeded with [`FilenameRegistry::scan`].

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::filename::{numbered_candidate, split_name};

/// Shared set of claimed filenames, guarded by a single mutex.
///
/// Each operation is one short critical section and the lock is never held
/// across network or disk I/O.
#[derive(Debug, Default)]
pub struct FilenameRegistry {
    claimed: Mutex<HashSet<String>>,
}

impl FilenameRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry seeded with every entry already present in `dir`.
    ///
    /// A missing directory yields an empty registry.
    ///
    /// # Errors
    ///
    /// Returns the IO error if `dir` exists but cannot be listed.
    pub async fn scan(dir: &Path) -> std::io::Result<Self> {
        let mut claimed = HashSet::new();
        match tokio::fs::read_dir(dir).await {
            Ok(mut entries) => {
                while let Some(entry) = entries.next_entry().await? {
                    claimed.insert(entry.file_name().to_string_lossy().into_owned());
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        debug!(dir = %dir.display(), existing = claimed.len(), "seeded filename registry");
        Ok(Self {
            claimed: Mutex::new(claimed),
        })
    }

    /// Reserves `base`, or the first free `stem(n)ext` variant, and returns it.
    ///
    /// Candidates are probed in strictly ascending order: the bare name first,
    /// then `(1)`, `(2)`, ... No two callers are ever handed the same name.
    pub fn claim(&self, base: &str) -> String {
        let mut claimed = self.lock();
        claim_in(&mut claimed, base)
    }

    /// Frees a previously claimed name. Returns whether it was claimed.
    pub fn release(&self, name: &str) -> bool {
        self.lock().remove(name)
    }

    /// Atomically swaps the claim on `old` for a fresh claim on `new_base`.
    ///
    /// `old` is released first, so renaming to the same base can hand `old` back.
    pub fn rename(&self, old: &str, new_base: &str) -> String {
        let mut claimed = self.lock();
        claimed.remove(old);
        claim_in(&mut claimed, new_base)
    }

    /// Returns whether `name` is currently claimed.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains(name)
    }

    /// Number of claimed names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true when nothing is claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic elsewhere never leaves the set half-updated, so a poisoned lock is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.claimed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn claim_in(claimed: &mut HashSet<String>, base: &str) -> String {
    let (stem, ext) = split_name(base);
    let mut index = 0;
    loop {
        let candidate = numbered_candidate(stem, ext, index);
        if !claimed.contains(&candidate) {
            claimed.insert(candidate.clone());
            return candidate;
        }
        index += 1;
    }
}
