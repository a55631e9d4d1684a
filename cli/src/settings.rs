//! Converts parsed command-line arguments into a [`rootcraft::Settings`].

use std::path::PathBuf;

use rootcraft::Format;
use rootcraft::Settings;

use crate::Args;

/// Build run settings from `args`, splitting its `-X name=value` pins.
pub fn from_args(args: &Args) -> Settings {
    let pinned_vars = args
        .var
        .iter()
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    Settings {
        format: if args.cpio { Format::Cpio } else { Format::Tar },
        rootfs: args.rootfs.clone().unwrap_or_else(PathBuf::new),
        ld_so_conf: args.ld_so_conf.clone(),
        pinned_vars,
        elf_expand: !args.no_elf_expand,
        glob_expand: !args.no_glob_expand,
        file_expand: !args.no_file_expand,
        elf_once: !args.no_elf_once,
        elf_fallback: args.elf_fallback,
        path_dirs: args.path_dir.clone(),
        concurrent: !args.sequential,
        num_workers: args.jobs.unwrap_or(0),
        warn_empty_glob: !args.no_warn_empty_glob,
        warn_replace: args.warn_replace,
        buffer_size: args.buffer_size,
        print_only: args.list,
    }
}
