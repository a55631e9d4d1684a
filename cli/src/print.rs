//! `--list` pretty-printer: one tab-separated line per entry, colored by kind.

use colored::Colorize;
use rootcraft::Entry;
use rootcraft::Kind;

fn type_code(kind: Kind) -> &'static str {
    match kind {
        Kind::Directory => "d",
        Kind::Regular => "f",
        Kind::Symlink => "l",
        Kind::Create => "c",
        Kind::CreateNoEndl => "cl",
        Kind::Base64 => "b64",
        _ => "?",
    }
}

/// Print one line per entry to stdout: type, mode, owner, size, and path,
/// colored by kind so directories/symlinks stand out in a terminal.
pub fn list(entries: &[Entry]) {
    for entry in entries {
        let code = type_code(entry.kind);
        let path = match entry.kind {
            Kind::Directory => entry.dst.blue().bold(),
            Kind::Symlink => entry.dst.cyan(),
            _ => entry.dst.normal(),
        };
        let extra = if entry.kind == Kind::Symlink {
            format!(" -> {}", entry.src)
        } else {
            String::new()
        };
        println!(
            "{code}\t{:o}\t{}:{}\t{}{extra}",
            entry.mode, entry.user, entry.group, path
        );
    }
}
