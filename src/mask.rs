//! The mask stack: an ordered list of regex-addressed rewrite rules applied
//! to every entry as it's added.
//!
//! Directive kinds: `mr` (replace `dst`), `mi`/`mI` (ignore, the latter
//! negated), `mm` (set mode/uid/gid), `mt` (set time), `ml` (attach extra ELF
//! library search directories), and `mc` (clear one, a trailing range, or all
//! masks). Each of the first five is addressed by a 0-based index or `-` to
//! append; `mc` removes by index, removes the last N when given a bare
//! count, or clears everything when given no argument.

use regex::Regex;

use crate::Error;
use crate::Result;

/// What a single mask slot does when its pattern matches an entry's `dst`.
#[derive(Clone)]
pub enum MaskKind {
    /// `mr`: regex replace against `dst`, first match only.
    Replace {
        /// Compiled match pattern.
        pattern: Regex,
        /// Replacement template (`$1`-style capture references allowed).
        replacement: String,
    },
    /// `mi`/`mI`: drop the entry entirely; `mI` inverts the match.
    Ignore {
        /// Compiled match pattern.
        pattern: Regex,
        /// `true` for `mI`: drop entries that *don't* match.
        negate: bool,
    },
    /// `mm`: force any subset of the entry's mode/uid/gid.
    Mode {
        /// Compiled match pattern.
        pattern: Regex,
        /// Mode bits to apply, if given.
        mode: Option<u32>,
        /// Owner uid to apply, if given.
        uid: Option<i64>,
        /// Owner gid to apply, if given.
        gid: Option<i64>,
    },
    /// `mt`: force the entry's mtime.
    Time {
        /// Compiled match pattern.
        pattern: Regex,
        /// Seconds since epoch to apply.
        time: i64,
    },
    /// `ml`: attach extra ELF library search directories.
    Library {
        /// Compiled match pattern.
        pattern: Regex,
        /// Directories to append to the entry's search path.
        dirs: Vec<String>,
    },
}

impl MaskKind {
    fn pattern(&self) -> &Regex {
        match self {
            MaskKind::Replace { pattern, .. }
            | MaskKind::Ignore { pattern, .. }
            | MaskKind::Mode { pattern, .. }
            | MaskKind::Time { pattern, .. }
            | MaskKind::Library { pattern, .. } => pattern,
        }
    }
}

/// Outcome of running a candidate `dst` through the mask stack.
pub struct MaskEffect {
    /// Rewritten `dst`, after any `mr` matches.
    pub dst: String,
    /// `true` if an `mi` mask matched: the caller should drop the entry.
    pub ignored: bool,
    /// Mode override from the last matching `mm`, if any.
    pub mode: Option<u32>,
    /// Uid override from the last matching `mm`, if any.
    pub uid: Option<i64>,
    /// Gid override from the last matching `mm`, if any.
    pub gid: Option<i64>,
    /// Time override from the last matching `mt`, if any.
    pub time: Option<i64>,
    /// Extra search directories from every matching `ml`, in mask order.
    pub library_dirs: Vec<String>,
}

/// The mask stack. Index addressing (`mm3`, `mc3`, ...) refers to position
/// within this `Vec`, in the order masks were pushed.
///
/// `Clone` is load-bearing: each concurrent ELF resolution job snapshots the
/// mask stack at dispatch time (see `builder::Recipe::add_linked_from_host`),
/// so later parser-driven mutations can't race against entries that job
/// inserts once its resolution completes.
#[derive(Default, Clone)]
pub struct MaskStack {
    masks: Vec<MaskKind>,
}

/// Where a `set`/`clear` directive's index argument points.
pub enum Addr {
    /// A specific 0-based slot; replaces what's there if occupied.
    At(usize),
    /// `-`: append a new slot.
    Append,
}

impl MaskStack {
    /// New, empty mask stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current number of masks (including any set by earlier `set` calls).
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    /// `true` if no masks are active.
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Set (replace-in-place) or append (`Addr::Append`) a mask slot.
    ///
    /// Virtual entry kinds (`Kind::is_virtual`) are never run through
    /// `apply`'s regex masks by the caller — see `builder::Recipe::add` —
    /// so every mask kind here is uniformly a pass-through for them
    /// (resolving the inconsistent skip-lists found across historical
    /// revisions of this mechanism).
    pub fn set(&mut self, addr: Addr, kind: MaskKind) -> Result<()> {
        match addr {
            Addr::Append => {
                self.masks.push(kind);
                Ok(())
            }
            Addr::At(i) => {
                if i >= self.masks.len() {
                    return Err(Error::UndefinedMask(i as i64));
                }
                self.masks[i] = kind;
                Ok(())
            }
        }
    }

    /// `mc`: clear everything, clear the last `n` slots, or clear one slot
    /// by index, per the three argument shapes the directive accepts.
    pub fn clear(&mut self, addr: Option<ClearAddr>) -> Result<()> {
        match addr {
            None => {
                self.masks.clear();
                Ok(())
            }
            Some(ClearAddr::LastN(n)) => {
                let n = n.min(self.masks.len());
                self.masks.truncate(self.masks.len() - n);
                Ok(())
            }
            Some(ClearAddr::At(i)) => {
                if i >= self.masks.len() {
                    return Err(Error::UndefinedMask(i as i64));
                }
                self.masks.remove(i);
                Ok(())
            }
        }
    }

    /// Run `dst` through every mask in order, folding their effects.
    /// An `mi` match short-circuits the remaining masks (the entry is
    /// already doomed) but still returns accumulated mode/time/library
    /// effects for callers that want to report them.
    pub fn apply(&self, dst: &str) -> MaskEffect {
        let mut effect = MaskEffect {
            dst: dst.to_string(),
            ignored: false,
            mode: None,
            uid: None,
            gid: None,
            time: None,
            library_dirs: Vec::new(),
        };
        for mask in &self.masks {
            let is_match = mask.pattern().is_match(&effect.dst);
            if let MaskKind::Ignore { negate, .. } = mask {
                if is_match != *negate {
                    effect.ignored = true;
                    break;
                }
                continue;
            }
            if !is_match {
                continue;
            }
            match mask {
                MaskKind::Ignore { .. } => unreachable!(),
                MaskKind::Replace { pattern, replacement } => {
                    effect.dst = pattern.replace(&effect.dst, replacement.as_str()).into_owned();
                }
                MaskKind::Mode { mode, uid, gid, .. } => {
                    if let Some(m) = mode {
                        effect.mode = Some(*m);
                    }
                    if let Some(u) = uid {
                        effect.uid = Some(*u);
                    }
                    if let Some(g) = gid {
                        effect.gid = Some(*g);
                    }
                }
                MaskKind::Time { time, .. } => effect.time = Some(*time),
                MaskKind::Library { dirs, .. } => effect.library_dirs.extend(dirs.iter().cloned()),
            }
        }
        effect
    }
}

/// Argument shape for an `mc` directive.
pub enum ClearAddr {
    /// Bare count: drop the last `n` masks.
    LastN(usize),
    /// Explicit index: drop exactly that slot.
    At(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn re(s: &str) -> Regex {
        Regex::new(s).unwrap()
    }

    #[test]
    fn replace_rewrites_dst() {
        let mut stack = MaskStack::new();
        stack
            .set(
                Addr::Append,
                MaskKind::Replace {
                    pattern: re("^usr/"),
                    replacement: String::new(),
                },
            )
            .unwrap();
        assert_eq!(stack.apply("usr/bin/ls").dst, "bin/ls");
    }

    #[test]
    fn ignore_short_circuits() {
        let mut stack = MaskStack::new();
        stack
            .set(Addr::Append, MaskKind::Ignore { pattern: re("\\.tmp$"), negate: false })
            .unwrap();
        assert!(stack.apply("a.tmp").ignored);
        assert!(!stack.apply("a.txt").ignored);
    }

    #[test]
    fn negated_ignore_drops_non_matches() {
        let mut stack = MaskStack::new();
        stack
            .set(Addr::Append, MaskKind::Ignore { pattern: re("^keep/"), negate: true })
            .unwrap();
        assert!(!stack.apply("keep/a").ignored);
        assert!(stack.apply("drop/a").ignored);
    }

    #[test]
    fn set_by_index_replaces_in_place() {
        let mut stack = MaskStack::new();
        stack
            .set(
                Addr::Append,
                MaskKind::Mode { pattern: re("a"), mode: Some(0o600), uid: None, gid: None },
            )
            .unwrap();
        stack
            .set(
                Addr::At(0),
                MaskKind::Mode { pattern: re("a"), mode: Some(0o400), uid: Some(1), gid: Some(2) },
            )
            .unwrap();
        assert_eq!(stack.len(), 1);
        let effect = stack.apply("a");
        assert_eq!(effect.mode, Some(0o400));
        assert_eq!(effect.uid, Some(1));
        assert_eq!(effect.gid, Some(2));
    }

    #[test]
    fn clear_by_index_and_all() {
        let mut stack = MaskStack::new();
        stack
            .set(Addr::Append, MaskKind::Mode { pattern: re("a"), mode: Some(1), uid: None, gid: None })
            .unwrap();
        stack
            .set(Addr::Append, MaskKind::Mode { pattern: re("b"), mode: Some(2), uid: None, gid: None })
            .unwrap();
        stack.clear(Some(ClearAddr::At(0))).unwrap();
        assert_eq!(stack.len(), 1);
        stack.clear(None).unwrap();
        assert!(stack.is_empty());
    }

    #[test]
    fn undefined_index_is_an_error() {
        let mut stack = MaskStack::new();
        assert!(stack
            .set(Addr::At(0), MaskKind::Mode { pattern: re("a"), mode: Some(1), uid: None, gid: None })
            .is_err());
        assert!(stack.clear(Some(ClearAddr::At(0))).is_err());
    }
}
