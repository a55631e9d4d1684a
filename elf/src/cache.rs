//! Session-scoped caches shared across every [`crate::resolver::Resolver`]
//! lookup: a memoized directory listing (so repeated `DT_NEEDED` searches
//! against the same directory don't re-`read_dir` it), a set of directories
//! already known to hold the wrong ELF class, and a per-target resolve
//! result cache. All mutexed so concurrent resolution (§5) can share one
//! instance across worker threads.

use std::collections::HashMap;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use rootcraft::ResolvedElf;

fn recover<T>(poisoned: std::sync::PoisonError<T>) -> T {
    poisoned.into_inner()
}

/// Memoized `dir -> {basenames}` listing plus a set of directories recorded
/// as holding the wrong ELF class for the class currently being resolved.
#[derive(Default)]
pub struct DirCache {
    listings: Mutex<HashMap<PathBuf, HashSet<String>>>,
    bad_class: Mutex<HashSet<PathBuf>>,
}

impl DirCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if `dir` contains a file named `name`. Reads `dir` at most
    /// once per cache lifetime; an unreadable directory is cached as empty.
    pub fn contains(&self, dir: &Path, name: &str) -> bool {
        let mut listings = self.listings.lock().unwrap_or_else(recover);
        let names = listings.entry(dir.to_path_buf()).or_insert_with(|| {
            fs::read_dir(dir)
                .map(|rd| rd.filter_map(|e| e.ok()).filter_map(|e| e.file_name().into_string().ok()).collect())
                .unwrap_or_default()
        });
        names.contains(name)
    }

    /// Record `dir` as holding a file of the wrong ELF class, so later
    /// lookups skip opening files there at all.
    pub fn mark_bad_class(&self, dir: &Path) {
        self.bad_class.lock().unwrap_or_else(recover).insert(dir.to_path_buf());
    }

    /// `true` if `dir` was previously marked by [`mark_bad_class`].
    ///
    /// [`mark_bad_class`]: DirCache::mark_bad_class
    pub fn is_bad_class(&self, dir: &Path) -> bool {
        self.bad_class.lock().unwrap_or_else(recover).contains(dir)
    }
}

/// Per-session cache of whole-target resolve results, keyed by the
/// target's absolute host path. Shared across every `resolve()` call on one
/// [`crate::resolver::Resolver`] so re-resolving the same binary (e.g. two
/// recipe lines referencing the same interpreter) only walks it once.
#[derive(Default)]
pub struct ResultCache {
    results: Mutex<HashMap<PathBuf, ResolvedElf>>,
}

impl ResultCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Previously cached result for `target`, if any.
    pub fn get(&self, target: &Path) -> Option<ResolvedElf> {
        self.results.lock().unwrap_or_else(recover).get(target).cloned()
    }

    /// Record `result` for `target`.
    pub fn insert(&self, target: PathBuf, result: ResolvedElf) {
        self.results.lock().unwrap_or_else(recover).insert(target, result);
    }
}
