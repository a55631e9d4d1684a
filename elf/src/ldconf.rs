//! Parsing for glibc's `ld.so.conf` (with glob-expanded `include` directives)
//! and musl's `ld-musl-<arch>.path`.

use std::path::Path;
use std::path::PathBuf;

use crate::error::Result;

/// Default library directories consulted after `ld.so.conf`/`ld-musl-*.path`,
/// rootfs-relative (no leading `/`).
pub const DEFAULT_LIB_DIRS: &[&str] = &["lib64", "usr/lib64", "lib", "usr/lib"];

fn read_to_string(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

/// Recursively parse a glibc-style `ld.so.conf` file, following `include`
/// directives (which may be glob patterns, resolved relative to `rootfs`).
/// Missing files are silently skipped, matching `ldconfig`'s own behavior.
pub fn parse_ld_so_conf(rootfs: &Path, conf_path: &Path) -> Result<Vec<String>> {
    let mut dirs = Vec::new();
    parse_ld_so_conf_into(rootfs, conf_path, &mut dirs)?;
    Ok(dirs)
}

fn parse_ld_so_conf_into(rootfs: &Path, conf_path: &Path, dirs: &mut Vec<String>) -> Result<()> {
    let Some(content) = read_to_string(conf_path) else {
        return Ok(());
    };
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(pattern) = line.strip_prefix("include ") {
            let pattern = pattern.trim();
            let full_pattern = if pattern.starts_with('/') {
                rootfs.join(pattern.trim_start_matches('/')).to_string_lossy().into_owned()
            } else {
                conf_path
                    .parent()
                    .unwrap_or_else(|| Path::new(""))
                    .join(pattern)
                    .to_string_lossy()
                    .into_owned()
            };
            for entry in glob::glob(&full_pattern)? {
                if let Ok(included) = entry {
                    parse_ld_so_conf_into(rootfs, &included, dirs)?;
                }
            }
            continue;
        }
        dirs.push(rootfs.join(line.trim_start_matches('/')).to_string_lossy().into_owned());
    }
    Ok(())
}

/// Read musl's `ld-musl-<arch>.path`, one search directory per line.
/// Returns an empty vec (not an error) when the file is absent, so the
/// caller falls back to [`DEFAULT_LIB_DIRS`].
pub fn parse_musl_path(path: &Path) -> Vec<String> {
    match read_to_string(path) {
        Some(content) => content.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect(),
        None => Vec::new(),
    }
}

/// musl's per-arch path file name, e.g. `etc/ld-musl-x86_64.path`.
pub fn musl_path_file(rootfs: &Path, arch: &str) -> PathBuf {
    rootfs.join("etc").join(format!("ld-musl-{arch}.path"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_directory_lines() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("ld.so.conf");
        std::fs::write(&conf, "/usr/local/lib\n# comment\n\n/opt/lib\n").unwrap();
        let dirs = parse_ld_so_conf(dir.path(), &conf).unwrap();
        assert_eq!(
            dirs,
            vec![
                dir.path().join("usr/local/lib").to_string_lossy().into_owned(),
                dir.path().join("opt/lib").to_string_lossy().into_owned(),
            ]
        );
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = parse_ld_so_conf(dir.path(), &dir.path().join("nope.conf")).unwrap();
        assert!(dirs.is_empty());
    }

    #[test]
    fn include_expands_globs_relative_to_conf_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("conf.d")).unwrap();
        std::fs::write(dir.path().join("conf.d/a.conf"), "/a/lib\n").unwrap();
        let conf = dir.path().join("ld.so.conf");
        std::fs::write(&conf, "include conf.d/*.conf\n").unwrap();
        let dirs = parse_ld_so_conf(dir.path(), &conf).unwrap();
        assert_eq!(dirs, vec![dir.path().join("a/lib").to_string_lossy().into_owned()]);
    }
}
