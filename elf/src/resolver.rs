//! The dependency walk itself: a depth-first search over `DT_NEEDED` that
//! assembles each object's search directories the way glibc's or musl's
//! dynamic linker would, and implements [`rootcraft::ElfResolver`].

use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use rootcraft::ElfResolveOptions;
use rootcraft::ElfResolver;
use rootcraft::Libc;
use rootcraft::ResolvedDependency;
use rootcraft::ResolvedElf;

use crate::cache::DirCache;
use crate::cache::ResultCache;
use crate::class::Class;
use crate::elf_file::DynamicInfo;
use crate::elf_file::ElfFile;
use crate::error::Error;
use crate::ldconf;
use crate::search::interpolate;
use crate::search::SearchPath;

/// libc terminator: DT_NEEDED entries equal to this (or starting with this
/// prefix, to also catch versioned sonames) end the DFS at that node
/// without walking libc's own internal dependency graph.
const LIBC_TERMINATOR_PREFIX: &str = "libc.so";

/// Resolves ELF dependencies against a host filesystem for a given libc
/// flavor. Holds the session-scoped directory-listing and resolve-result
/// caches (§4.C), shared across every call (and, in concurrent mode, every
/// worker thread) made through one instance.
pub struct Resolver {
    libc: Libc,
    dir_cache: DirCache,
    result_cache: ResultCache,
}

impl Resolver {
    /// Build a resolver for an explicitly known libc flavor.
    pub fn new(libc: Libc) -> Self {
        Resolver { libc, dir_cache: DirCache::new(), result_cache: ResultCache::new() }
    }

    /// Detect the libc flavor by probing for musl's `etc/ld-musl-<arch>.path`
    /// under `rootfs`; falls back to glibc when absent.
    pub fn detect(rootfs: &Path) -> Self {
        let arch = std::env::consts::ARCH;
        if ldconf::musl_path_file(rootfs, arch).is_file() {
            Resolver::new(Libc::Musl)
        } else {
            Resolver::new(Libc::Glibc)
        }
    }

    /// Join a `PT_INTERP` path (almost always absolute) to `rootfs`, the way
    /// every other rootfs-bound lookup in this module does.
    fn join_rootfs(rootfs: &Path, p: &str) -> PathBuf {
        rootfs.join(p.trim_start_matches('/'))
    }

    fn default_search_dirs(&self, rootfs: &Path, ld_so_conf: Option<&Path>) -> Vec<String> {
        match self.libc {
            Libc::Glibc => {
                let conf_path = ld_so_conf.map(PathBuf::from).unwrap_or_else(|| rootfs.join("etc/ld.so.conf"));
                ldconf::parse_ld_so_conf(rootfs, &conf_path).unwrap_or_default()
            }
            Libc::Musl => {
                let arch = std::env::consts::ARCH;
                ldconf::parse_musl_path(&ldconf::musl_path_file(rootfs, arch))
            }
        }
    }

    fn ld_library_path() -> Vec<String> {
        std::env::var("LD_LIBRARY_PATH")
            .ok()
            .map(|v| v.split(':').filter(|s| !s.is_empty()).map(String::from).collect())
            .unwrap_or_default()
    }

    /// Search `dirs` in order for a file named `name`; the first existing,
    /// class-matching candidate wins. Consults the memoized directory
    /// listing before opening anything, and once a non-default-lib
    /// directory is found to hold the wrong ELF class it's recorded as bad
    /// and skipped for every subsequent name in this resolve — default-lib
    /// directories (`default_dirs`) are exempt, since mixed 32/64-bit
    /// toolchains commonly share `/lib` and `/lib64` for different names.
    fn search1(&self, dirs: &SearchPath, name: &str, class: Class, default_dirs: &[String]) -> Option<PathBuf> {
        for dir in dirs.iter() {
            let is_default = default_dirs.iter().any(|d| d == dir);
            let dir_path = Path::new(dir);
            if !is_default && self.dir_cache.is_bad_class(dir_path) {
                continue;
            }
            if !self.dir_cache.contains(dir_path, name) {
                continue;
            }
            let candidate = dir_path.join(name);
            match ElfFile::open(&candidate) {
                Ok(found) if found.class() == class => return Some(candidate),
                Ok(_) if !is_default => {
                    self.dir_cache.mark_bad_class(dir_path);
                }
                _ => {}
            }
        }
        None
    }

    #[allow(clippy::too_many_arguments)]
    fn walk(
        &self,
        object_path: &Path,
        dynamic: &DynamicInfo,
        class: Class,
        rootfs: &Path,
        extra_search: &[String],
        ld_so_conf: Option<&Path>,
        inherited_rpath: &[String],
        inherited_runpath: &[String],
        resolve_once: bool,
        visited: &mut HashSet<PathBuf>,
        out: &mut Vec<ResolvedDependency>,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let origin_dir = object_path.parent().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();

        let own_rpath: Vec<String> = dynamic.rpath.iter().map(|e| interpolate(e, &origin_dir)).collect();
        let own_runpath: Vec<String> = dynamic.runpath.iter().map(|e| interpolate(e, &origin_dir)).collect();

        let mut search = SearchPath::new();
        if !origin_dir.is_empty() {
            search.push(origin_dir.clone());
        }
        search.extend(extra_search.iter().cloned());
        search.extend(Self::ld_library_path());

        // Step 1 of the five-step order: the *calling* object's own RUNPATH,
        // saved by the caller before it reassigned its search state to this
        // object's own values (`oldrunpath` in the original walk).
        search.extend(inherited_runpath.iter().cloned());

        match self.libc {
            Libc::Glibc => {
                search.extend(inherited_rpath.iter().cloned());
                if own_runpath.is_empty() {
                    search.extend(own_rpath.clone());
                }
                search.extend(own_runpath.clone());
            }
            Libc::Musl => {
                search.extend(own_rpath.clone());
                search.extend(own_runpath.clone());
                search.extend(inherited_rpath.iter().cloned());
            }
        }
        search.extend(self.default_search_dirs(rootfs, ld_so_conf));
        let default_dirs: Vec<String> = ldconf::DEFAULT_LIB_DIRS.iter().map(|d| rootfs.join(d).to_string_lossy().into_owned()).collect();
        search.extend(default_dirs.iter().cloned());

        // RPATH inheritance: per glibc rules an object's own RPATH only
        // continues to apply to its descendants if it didn't itself define
        // a RUNPATH (RUNPATH is never inherited at all).
        let child_rpath: Vec<String> = if self.libc == Libc::Glibc && !own_runpath.is_empty() {
            inherited_rpath.to_vec()
        } else {
            let mut combined = inherited_rpath.to_vec();
            combined.extend(own_rpath);
            combined
        };

        for name in &dynamic.needed {
            // libc.so is a terminator: glibc's `libc.so` is sometimes a text
            // linker script rather than a real ELF, and musl uses the same
            // name as its own interpreter, so neither resolving it nor
            // walking its own dependency graph is meaningful here. Record it
            // if found, without erroring if it isn't, and stop processing
            // the rest of this object's `DT_NEEDED` list entirely.
            if name.starts_with(LIBC_TERMINATOR_PREFIX) {
                if let Some(found) = self.search1(&search, name, class, &default_dirs) {
                    out.push(ResolvedDependency { path: found, needed_name: name.clone() });
                }
                break;
            }

            let Some(found) = self.search1(&search, name, class, &default_dirs) else {
                return Err(Box::new(Error::BadStringTable(PathBuf::from(name))));
            };
            // Real-path the match for cycle detection and for reading its own
            // dynamic section, but keep `found` (which may itself be a
            // soname symlink, e.g. a versioned `.so.N`) as the dependency's
            // reported path: the caller materializes any hops in between as
            // their own archive entries rather than losing them to
            // canonicalization.
            let canonical = PathBuf::from(
                rootcraft::path::expand(&found.to_string_lossy(), "", |_hop| {})
                    .unwrap_or_else(|_| found.to_string_lossy().into_owned()),
            );
            if resolve_once && visited.contains(&canonical) {
                continue;
            }
            visited.insert(canonical.clone());
            out.push(ResolvedDependency {
                path: found.clone(),
                needed_name: name.clone(),
            });

            let dep_elf = ElfFile::open(&canonical)?;
            if let Some(dep_dynamic) = dep_elf.dynamic() {
                self.walk(
                    &canonical,
                    dep_dynamic,
                    class,
                    rootfs,
                    extra_search,
                    ld_so_conf,
                    &child_rpath,
                    &own_runpath,
                    resolve_once,
                    visited,
                    out,
                )?;
            }
        }
        Ok(())
    }
}

impl ElfResolver for Resolver {
    fn resolve(
        &self,
        target: &Path,
        options: &ElfResolveOptions,
    ) -> std::result::Result<ResolvedElf, Box<dyn std::error::Error + Send + Sync>> {
        if let Some(cached) = self.result_cache.get(target) {
            return Ok(cached);
        }

        let elf = match ElfFile::open(target) {
            Ok(elf) => elf,
            Err(Error::NotElf(_)) => return Ok(ResolvedElf { is_dynamic: false, interpreter: None, dependencies: Vec::new() }),
            Err(e) => return Err(Box::new(e)),
        };
        let interpreter = elf.interpreter().map(|i| Self::join_rootfs(&options.rootfs, i));
        let Some(dynamic) = elf.dynamic() else {
            let result = ResolvedElf { is_dynamic: false, interpreter, dependencies: Vec::new() };
            self.result_cache.insert(target.to_path_buf(), result.clone());
            return Ok(result);
        };

        let mut visited = HashSet::new();
        let mut out = Vec::new();
        self.walk(
            target,
            dynamic,
            elf.class(),
            &options.rootfs,
            &options.extra_search_dirs,
            options.ld_so_conf.as_deref(),
            &[],
            &[],
            options.resolve_once,
            &mut visited,
            &mut out,
        )?;
        let result = ResolvedElf { is_dynamic: true, interpreter, dependencies: out };
        self.result_cache.insert(target.to_path_buf(), result.clone());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_elf_target_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("script.sh");
        std::fs::write(&script, b"#!/bin/sh\necho hi\n").unwrap();
        let resolver = Resolver::new(Libc::Glibc);
        let result = resolver
            .resolve(
                &script,
                &ElfResolveOptions {
                    rootfs: dir.path().to_path_buf(),
                    extra_search_dirs: vec![],
                    ld_so_conf: None,
                    resolve_once: true,
                },
            )
            .unwrap();
        assert!(!result.is_dynamic);
    }
}
