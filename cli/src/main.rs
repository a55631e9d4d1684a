//! `rootcraft`: build a deterministic tar or cpio archive from a recipe.

mod logger;
mod print;
mod run;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

/// Build a tar or cpio archive from one or more recipe files.
#[derive(Parser, Debug)]
#[command(name = "rootcraft", version, about)]
pub struct Args {
    /// Recipe files to run, in order.
    #[arg(required = true)]
    pub recipes: Vec<PathBuf>,

    /// Output archive path, or `-` for stdout.
    #[arg(short = 'o', long, default_value = "-")]
    pub output: PathBuf,

    /// Write a cpio archive instead of tar.
    #[arg(long)]
    pub cpio: bool,

    /// Host filesystem root that rootfs-relative entries and ELF resolution
    /// are bound to. Defaults to the real root.
    #[arg(long)]
    pub rootfs: Option<PathBuf>,

    /// Override path to `ld.so.conf`.
    #[arg(long)]
    pub ld_so_conf: Option<PathBuf>,

    /// Pin a recipe variable: `-X name=value`. May be repeated.
    #[arg(short = 'X', long = "var")]
    pub var: Vec<String>,

    /// Search directory for `p` (`Path`-lookup) entries. May be repeated;
    /// defaults to the `PATH` environment variable, split on `:`.
    #[arg(long = "path-dir")]
    pub path_dir: Vec<String>,

    /// Disable ELF dependency resolution for `L`/`LA`/`rL`/`i` entries.
    #[arg(long)]
    pub no_elf_expand: bool,

    /// Disable filesystem expansion of `r`/`rr` glob entries.
    #[arg(long)]
    pub no_glob_expand: bool,

    /// Disable filesystem stat for `a`/`ar` auto-detect entries.
    #[arg(long)]
    pub no_file_expand: bool,

    /// Re-resolve a dependency every time it's needed, instead of once per run.
    #[arg(long)]
    pub no_elf_once: bool,

    /// Treat a missing ELF dependency as a warning instead of a hard error.
    #[arg(long)]
    pub elf_fallback: bool,

    /// Resolve ELF dependencies sequentially instead of with a worker pool.
    #[arg(long)]
    pub sequential: bool,

    /// Worker pool size for concurrent ELF resolution (0 = let rayon choose).
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Don't warn when a glob entry matches nothing.
    #[arg(long)]
    pub no_warn_empty_glob: bool,

    /// Warn whenever a mask replaces an already-present entry.
    #[arg(long)]
    pub warn_replace: bool,

    /// I/O buffer size, in bytes, for copying file bodies into the archive.
    #[arg(long, default_value_t = 65536)]
    pub buffer_size: usize,

    /// Parse and list entries without writing an archive.
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Increase logging verbosity; may be repeated.
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Silence everything but errors.
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    logger::init(logger::level_for_verbosity(args.verbose, args.quiet));

    let settings = settings::from_args(&args);
    match run::run(&args.recipes, &args.output, settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
