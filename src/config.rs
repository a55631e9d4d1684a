//! Run-wide settings threaded through a recipe run: output format, rootfs
//! prefix, ELF search policy, pinned variables, and diagnostics toggles.

use std::path::PathBuf;

/// Destination archive format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// USTAR/PAX tar stream.
    Tar,
    /// New-ASCII cpio stream.
    Cpio,
}

/// Run-wide configuration for a [`crate::builder::Recipe`]. Built by the CLI
/// from its flags; library callers construct one directly.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Destination archive format.
    pub format: Format,
    /// Host filesystem root that `*Rel`-suffixed entry kinds and ELF
    /// resolution are relative to. Empty means the real root.
    pub rootfs: PathBuf,
    /// Override path to `ld.so.conf` (glibc) used during ELF resolution.
    pub ld_so_conf: Option<PathBuf>,
    /// `-X name=value` command-line variable pins; see [`crate::vars::VariableMap::with_pinned`].
    pub pinned_vars: Vec<(String, String)>,
    /// Whether `L`/`LA`/`rL`/`i` entries resolve ELF dependencies at all;
    /// `false` degrades them to a plain file copy (diagnostics/dry runs).
    pub elf_expand: bool,
    /// Whether `r`/`rr` glob entries are expanded against the filesystem.
    pub glob_expand: bool,
    /// Whether `a`/`ar` auto-detect entries are expanded against the
    /// filesystem (stat to tell regular file from symlink).
    pub file_expand: bool,
    /// Skip re-resolving a dependency whose absolute path was already
    /// resolved earlier in the same run.
    pub elf_once: bool,
    /// Treat a missing needed library as a (logged) no-op instead of a hard
    /// error, for `L`/`LA`/`rL`/`i` entries not marked failable.
    pub elf_fallback: bool,
    /// Search directories for `p` (`Path`-lookup) entries; empty means fall
    /// back to the `PATH` environment variable, split on `:`.
    pub path_dirs: Vec<String>,
    /// Resolve ELF entries concurrently via a bounded worker pool.
    pub concurrent: bool,
    /// Worker pool size when `concurrent` is set; `0` lets the pool pick.
    pub num_workers: usize,
    /// Warn (rather than silently ignore) when a glob entry matches nothing.
    pub warn_empty_glob: bool,
    /// Warn when a mask replaces an entry that was already present.
    pub warn_replace: bool,
    /// I/O buffer size used when copying file bodies into the archive.
    pub buffer_size: usize,
    /// Parse and pretty-print the recipe without writing an archive.
    pub print_only: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            format: Format::Tar,
            rootfs: PathBuf::new(),
            ld_so_conf: None,
            pinned_vars: Vec::new(),
            elf_expand: true,
            glob_expand: true,
            file_expand: true,
            elf_once: true,
            elf_fallback: false,
            path_dirs: Vec::new(),
            concurrent: true,
            num_workers: 0,
            warn_empty_glob: true,
            warn_replace: false,
            buffer_size: 64 * 1024,
            print_only: false,
        }
    }
}
