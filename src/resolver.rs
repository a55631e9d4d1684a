//! The ELF dependency resolution seam.
//!
//! This crate only defines the contract; [`rootcraft_elf`](https://docs.rs/rootcraft-elf)
//! implements it. Keeping the trait here (rather than in the `elf` crate)
//! lets [`crate::builder::Recipe`] depend on ELF resolution abstractly,
//! without the root crate depending on an ELF parser at all.

use std::path::Path;
use std::path::PathBuf;

/// Host filesystem's C library flavor, which changes how `RUNPATH` and
/// `RPATH` combine during the search (glibc orders them; musl doesn't
/// distinguish).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Libc {
    /// glibc: RUNPATH searched strictly after RPATH fails, RPATH inherited
    /// down the dependency chain, RUNPATH per-object only.
    Glibc,
    /// musl: RPATH and RUNPATH both apply, inherited uniformly.
    Musl,
}

/// Inputs to a single [`ElfResolver::resolve`] call.
#[derive(Debug, Clone)]
pub struct ElfResolveOptions {
    /// Host filesystem root the walk is bounded to; empty means the real root.
    pub rootfs: PathBuf,
    /// Extra search directories prepended ahead of RPATH/RUNPATH/default
    /// dirs, e.g. from a `library` mask.
    pub extra_search_dirs: Vec<String>,
    /// Override path to `ld.so.conf`; `None` uses the rootfs-relative default.
    pub ld_so_conf: Option<PathBuf>,
    /// Skip re-walking a dependency whose absolute path was already visited
    /// earlier in the same run.
    pub resolve_once: bool,
}

/// One dependency discovered while resolving `target`.
#[derive(Debug, Clone)]
pub struct ResolvedDependency {
    /// Absolute host filesystem path of the dependency.
    pub path: PathBuf,
    /// `DT_NEEDED` name this path was found for (for diagnostics).
    pub needed_name: String,
}

/// Output of a full dependency walk over one ELF file.
#[derive(Debug, Clone)]
pub struct ResolvedElf {
    /// `true` if `target` is a dynamically linked ELF at all; `false` means
    /// it's static (or not ELF) and `dependencies` is empty.
    pub is_dynamic: bool,
    /// The dynamic linker named in `PT_INTERP`, rootfs-joined, if present.
    pub interpreter: Option<PathBuf>,
    /// Every transitively needed shared object, in DFS discovery order,
    /// deduplicated by absolute path.
    pub dependencies: Vec<ResolvedDependency>,
}

/// Resolves an ELF file's transitive `DT_NEEDED` closure against a host
/// filesystem, following the same search order a dynamic linker would.
pub trait ElfResolver: Send + Sync {
    /// Resolve `target`'s dependency closure.
    ///
    /// `target` is an absolute host filesystem path (already inside
    /// `options.rootfs` when one is set). Returns
    /// [`crate::Error::Elf`]-worthy boxed errors on I/O or malformed-ELF
    /// failure; a target that isn't ELF at all is not an error; it comes
    /// back with `is_dynamic: false`.
    fn resolve(
        &self,
        target: &Path,
        options: &ElfResolveOptions,
    ) -> std::result::Result<ResolvedElf, Box<dyn std::error::Error + Send + Sync>>;
}
