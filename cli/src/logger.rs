//! A small `log::Log` implementation: level-gated, colored by severity,
//! written to stderr so stdout stays clean for `--list`/`--print` output.

use std::sync::OnceLock;

use colored::Colorize;
use log::Level;
use log::LevelFilter;
use log::Metadata;
use log::Record;

struct Logger {
    level: LevelFilter,
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "error".red().bold(),
            Level::Warn => "warn".yellow().bold(),
            Level::Info => "info".cyan(),
            Level::Debug => "debug".dimmed(),
            Level::Trace => "trace".dimmed(),
        };
        eprintln!("{tag}: {}", record.args());
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Install the process-wide logger at `level`. Safe to call more than once;
/// only the first call's level takes effect.
pub fn init(level: LevelFilter) {
    let logger = LOGGER.get_or_init(|| Logger { level });
    let _ = log::set_logger(logger);
    log::set_max_level(logger.level);
}

/// Map `-v`/`-vv`/quiet flag counts to a `log` level filter.
pub fn level_for_verbosity(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
