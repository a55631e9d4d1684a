//! Regex-segmented glob matching for `r`/`rr`/`rL` entry sources.
//!
//! Unlike a shell glob, a pattern segment here is a regular expression, not
//! a `fnmatch` pattern: `bin/(ls|cat)` and `lib/.*\.so(\.[0-9]+)*$` are both
//! valid. Matching walks the filesystem one path segment at a time, only
//! descending into directories whose segment pattern could still match
//! something deeper.

use std::path::Path;
use std::path::PathBuf;

use regex::Regex;

use crate::fs;
use crate::Result;

const META_CHARS: &str = "*?|({[^$";

/// `true` if `segment` contains a character that makes it a pattern rather
/// than a literal path component.
fn has_meta(segment: &str) -> bool {
    segment.chars().any(|c| META_CHARS.contains(c))
}

struct Elem {
    /// Original segment text (for literal segments, used verbatim).
    raw: String,
    /// `true` when the segment is `!pattern`: matches that DON'T match `pattern`.
    negate: bool,
    /// Compiled pattern, present only when the segment has metacharacters.
    regex: Option<Regex>,
}

impl Elem {
    fn compile(raw_segment: &str) -> Result<Self> {
        let (negate, body) = match raw_segment.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw_segment),
        };
        let regex = if has_meta(body) {
            Some(Regex::new(&format!("^{body}$"))?)
        } else {
            None
        };
        Ok(Elem {
            raw: body.to_string(),
            negate,
            regex,
        })
    }

    fn matches(&self, name: &str) -> bool {
        let hit = match &self.regex {
            Some(re) => re.is_match(name),
            None => self.raw == name,
        };
        hit != self.negate
    }

    fn is_literal(&self) -> bool {
        self.regex.is_none() && !self.negate
    }
}

/// Split `pattern` into its directory segments and compile each into an
/// [`Elem`]. A pattern with no metacharacters at all is recognized by the
/// caller and short-circuited to a literal path instead of calling this.
fn compile(pattern: &str) -> Result<Vec<Elem>> {
    pattern.split('/').filter(|s| !s.is_empty()).map(Elem::compile).collect()
}

fn list_dir(dir: &Path) -> Vec<String> {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn walk(root: &Path, base: &Path, elems: &[Elem], out: &mut Vec<PathBuf>) {
    let Some((head, tail)) = elems.split_first() else {
        out.push(base.to_path_buf());
        return;
    };
    let dir = root.join(base);
    if head.is_literal() {
        let candidate = dir.join(&head.raw);
        if candidate.exists() {
            walk(root, &base.join(&head.raw), tail, out);
        }
        return;
    }
    for name in list_dir(&dir) {
        if !head.matches(&name) {
            continue;
        }
        let next_base = base.join(&name);
        if tail.is_empty() {
            out.push(next_base);
        } else if root.join(&next_base).is_dir() {
            walk(root, &next_base, tail, out);
        }
    }
}

/// Expand `pattern` (rooted at `root`, a host filesystem path) into the set
/// of matching paths, relative to `root`. A pattern with no metacharacters
/// returns itself unchanged, without touching the filesystem, matching a
/// literal path's behavior under any of the entry types that call this.
pub fn expand(root: &Path, pattern: &str) -> Result<Vec<String>> {
    if !has_meta(pattern) {
        return Ok(vec![pattern.trim_start_matches('/').to_string()]);
    }
    let elems = compile(pattern)?;
    let mut out = Vec::new();
    walk(root, Path::new(""), &elems, &mut out);
    out.sort();
    Ok(out
        .into_iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn literal_pattern_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let out = expand(dir.path(), "bin/ls").unwrap();
        assert_eq!(out, vec!["bin/ls".to_string()]);
    }

    #[test]
    fn alternation_matches_multiple_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "bin/ls");
        touch(dir.path(), "bin/cat");
        touch(dir.path(), "bin/echo");
        let mut out = expand(dir.path(), "bin/(ls|cat)").unwrap();
        out.sort();
        assert_eq!(out, vec!["bin/cat".to_string(), "bin/ls".to_string()]);
    }

    #[test]
    fn negated_segment_excludes_matches() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "lib/a.so");
        touch(dir.path(), "lib/a.a");
        let out = expand(dir.path(), "lib/!(.*\\.a)").unwrap();
        assert_eq!(out, vec!["lib/a.so".to_string()]);
    }
}
