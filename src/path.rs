//! POSIX-style path cleaning and prefix-bounded symlink expansion.
//!
//! `expand` walks a path component by component, exactly as the dynamic
//! linker would when resolving a path that may cross symlinks, but refuses
//! to step outside of `prefix` when one is given (so a rootfs-rooted walk
//! never escapes onto the host filesystem through an absolute link target).

use std::path::Path;
use std::path::PathBuf;

use crate::fs::read_link;
use crate::fs::symlink_metadata;
use crate::Error;
use crate::Result;

const MAX_SYMLINKS: usize = 255;

/// Lexically clean a POSIX path the way `path.Clean` does in Go: collapse
/// `.`, resolve lexical `..`, and fold repeated slashes, without touching
/// the filesystem. The empty string cleans to `.`.
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let rooted = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                if !rooted && (out.is_empty() || out.last() == Some(&"..")) {
                    out.push("..");
                } else if !out.is_empty() {
                    out.pop();
                }
            }
            c => out.push(c),
        }
    }
    let joined = out.join("/");
    let result = if rooted {
        format!("/{joined}")
    } else {
        joined
    };
    if result.is_empty() {
        ".".to_string()
    } else {
        result
    }
}

/// Join POSIX path segments and clean the result.
pub fn join(parts: &[&str]) -> String {
    let non_empty: Vec<&str> = parts.iter().copied().filter(|p| !p.is_empty()).collect();
    if non_empty.is_empty() {
        return String::new();
    }
    clean(&non_empty.join("/"))
}

/// Strip a leading `/` from an already-cleaned path.
pub fn strip_leading_slash(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

fn trim_prefix<'a>(path: &'a str, prefix: &str) -> &'a str {
    path.strip_prefix(prefix).unwrap_or(path)
}

/// One symlink hop observed while walking `expand`. Emitted so the caller
/// (the entry table) can mirror the hop into the archive as a symlink
/// Entry, matching real filesystem structure.
#[derive(Debug, Clone)]
pub struct SymlinkHop {
    /// Path of the symlink itself, with `prefix` stripped and no leading `/`.
    pub link_path: String,
    /// Raw `readlink` target, unmodified.
    pub target: String,
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    let ab = a.as_bytes();
    let bb = b.as_bytes();
    let mut k = 0;
    while k < ab.len() {
        if k >= bb.len() || ab[k] != bb[k] {
            return k;
        }
        k += 1;
    }
    ab.len()
}

/// Chase symlinks in `path`, but only for segments that lie within `prefix`.
///
/// When `prefix` is empty this is a plain real-path walk of the whole path.
/// Every symlink hop crossed is reported to `emit` before the walk
/// continues, so the caller can materialize it as an archive Entry.
///
/// Caps cumulative symlink traversals at 255 and returns
/// [`Error::TooManyLinks`] on exceedance.
pub fn expand(path: &str, prefix: &str, mut emit: impl FnMut(SymlinkHop)) -> Result<String> {
    if path.is_empty() {
        return Ok(path.to_string());
    }
    if !prefix.is_empty() && !path.starts_with(prefix) {
        return Ok(path.to_string());
    }

    let mut s = clean(path);
    let start = if !prefix.is_empty() {
        prefix.len() + 1
    } else if path.starts_with('/') {
        1
    } else {
        0
    };
    let mut n = start.min(s.len());
    let mut count = 0usize;

    loop {
        let ls = s.len();
        if n > ls {
            n = ls;
        }
        let mut lx = s.clone();
        let ln = n;
        if ls != n {
            let rest = &s[n..];
            let next_slash = rest.find('/');
            n = match next_slash {
                Some(p) => n + p + 1,
                None => ls,
            };
            lx = s[..n].to_string();
            if lx.ends_with('/') {
                lx.pop();
            }
        }
        let mut n = if ln == n { ls } else { n };

        let meta = match symlink_metadata(&lx) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(s),
            Err(e) => return Err(e.into()),
        };

        if !meta.is_symlink() {
            if ls != ln {
                // Keep walking further segments of the same path.
                continue;
            }
            return Ok(s);
        }

        if count > MAX_SYMLINKS {
            return Err(Error::TooManyLinks(PathBuf::from(path)));
        }
        count += 1;

        let raw_target = read_link(&lx)?;
        let target = raw_target.to_string_lossy().into_owned();

        let parent_slash = lx.rfind('/');
        let mut np = if target.starts_with('/') {
            join(&[prefix, &target])
        } else {
            let parent = parent_slash.map(|p| &lx[..p + 1]).unwrap_or("");
            join(&[parent, &target])
        };
        np = join(&[&np, &s[n..]]);

        if target.contains("..") {
            n = common_prefix_len(&lx, &np);
        }

        emit(SymlinkHop {
            link_path: strip_leading_slash(trim_prefix(&lx, prefix)).to_string(),
            target: target.clone(),
        });

        if let Some(x) = target.find('/') {
            if x != 0 {
                s = np;
            } else {
                s = np;
                n = prefix.len() + 1;
            }
        } else {
            s = np;
        }
    }
}

/// Report whether `path` lies within `prefix` (`prefix` empty means yes).
pub fn under_prefix(path: &Path, prefix: &Path) -> bool {
    prefix.as_os_str().is_empty() || path.starts_with(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_collapses_dot_segments() {
        assert_eq!(clean("a/./b/../c"), "a/c");
        assert_eq!(clean("/a/./b/../c"), "/a/c");
        assert_eq!(clean(""), ".");
        assert_eq!(clean("a//b"), "a/b");
    }

    #[test]
    fn clean_keeps_leading_parent_refs_relative() {
        assert_eq!(clean("../a"), "../a");
        assert_eq!(clean("a/../../b"), "../b");
    }

    #[test]
    fn clean_strips_root_escapes() {
        assert_eq!(clean("/../a"), "/a");
    }

    #[test]
    fn join_cleans_the_result() {
        assert_eq!(join(&["a", "b/", "../c"]), "a/c");
        assert_eq!(join(&["", "b"]), "b");
    }

    #[test]
    fn expand_without_symlinks_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"hi").unwrap();
        let mut hops = Vec::new();
        let out = expand(file.to_str().unwrap(), "", |h| hops.push(h)).unwrap();
        assert_eq!(out, file.to_str().unwrap());
        assert!(hops.is_empty());
    }

    #[test]
    fn expand_follows_a_relative_symlink_and_reports_it() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("real"), b"hi").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink("real", &link).unwrap();
        let mut hops = Vec::new();
        let out = expand(link.to_str().unwrap(), "", |h| hops.push(h)).unwrap();
        assert_eq!(out, dir.path().join("real").to_str().unwrap());
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].target, "real");
    }
}
