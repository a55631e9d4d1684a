//! The resolved archival object and the insertion-ordered keyed table that
//! holds it.

use std::collections::HashMap;

/// Tagged kind of a recipe line / Entry.
///
/// Virtual kinds (`Linked`, `LinkedAbs`, `LinkedGlob`, `Library`, `Path`,
/// `Recursive`, `RecursiveRel`, `Glob`, `GlobRel`, `Auto`, `AutoRel`) mean
/// "compute and append further entries" and are expanded away inside
/// [`crate::builder::Recipe::add`]; only the physical kinds below ever persist
/// in an [`EntryTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Physical: a directory.
    Directory,
    /// Physical: a plain file copied from `src`.
    Regular,
    /// Physical: a symlink, `src` holding the link target.
    Symlink,
    /// Physical: a file created from inline data, newline-terminated.
    Create,
    /// Physical: a file created from inline data, no trailing newline.
    CreateNoEndl,
    /// Physical: a file created from base64-encoded inline data.
    Base64,
    /// Virtual: ELF file plus its resolved library closure, rootfs-relative.
    Linked,
    /// Virtual: ELF file plus its resolved library closure, absolute (no rootfs prefix).
    LinkedAbs,
    /// Virtual: regex-matched directory of ELF files, each run through `Linked`.
    LinkedGlob,
    /// Virtual: a library looked up by basename among the default search dirs.
    Library,
    /// Virtual: a binary looked up by basename among `$PATH` (or configured `Path` dirs).
    Path,
    /// Virtual: recursive filesystem walk, rootfs-relative.
    Recursive,
    /// Virtual: recursive filesystem walk, `src` already rootfs-prefixed.
    RecursiveRel,
    /// Virtual: regex-segmented glob match, rootfs-relative.
    Glob,
    /// Virtual: regex-segmented glob match, `src` already rootfs-prefixed.
    GlobRel,
    /// Virtual: auto-detected regular file or symlink, rootfs-relative.
    Auto,
    /// Virtual: auto-detected regular file or symlink, `src` already rootfs-prefixed.
    AutoRel,
}

impl Kind {
    /// Parse a recipe type column into a `Kind`. Returns `None` for unknown codes
    /// (including mask/variable directives, which are handled separately).
    pub fn from_code(code: &str) -> Option<Self> {
        use Kind::*;
        Some(match code {
            "d" => Directory,
            "f" | "fr" => Regular, // `fr` is reduced to Regular after rootfs-prefixing src
            "l" => Symlink,
            "c" => Create,
            "cl" => CreateNoEndl,
            "b64" => Base64,
            "L" => Linked,
            "LA" => LinkedAbs,
            "rL" => LinkedGlob,
            "i" => Library,
            "p" => Path,
            "R" => Recursive,
            "Rr" => RecursiveRel,
            "r" => Glob,
            "rr" => GlobRel,
            "a" => Auto,
            "ar" => AutoRel,
            _ => return None,
        })
    }

    /// `true` for kinds that expand into zero or more physical entries and
    /// never persist in the table themselves.
    pub fn is_virtual(self) -> bool {
        use Kind::*;
        matches!(
            self,
            Linked
                | LinkedAbs
                | LinkedGlob
                | Library
                | Path
                | Recursive
                | RecursiveRel
                | Glob
                | GlobRel
                | Auto
                | AutoRel
        )
    }

    /// `true` for the ELF-family virtual kinds that route through the
    /// dependency resolver.
    pub fn is_elf(self) -> bool {
        matches!(self, Kind::Linked | Kind::LinkedAbs | Kind::LinkedGlob | Kind::Library)
    }
}

/// A resolved archival object. Only ever holds a physical [`Kind`] once it
/// lives in an [`EntryTable`].
#[derive(Debug, Clone)]
pub struct Entry {
    /// Archival kind. Always physical for a stored entry.
    pub kind: Kind,
    /// On-disk path (physical kinds) or symlink target (`Kind::Symlink`).
    pub src: String,
    /// Archive path: cleaned, no leading `/`. The table's identity key.
    pub dst: String,
    /// Numeric owner uid.
    pub user: i64,
    /// Numeric owner gid.
    pub group: i64,
    /// POSIX mode bits, including setuid/setgid/sticky.
    pub mode: u32,
    /// Seconds since epoch; 0 means unset.
    pub time: i64,
    /// Heredoc closing tag, empty when the entry wasn't built from one.
    pub heredoc: String,
    /// 1-based source recipe line, for diagnostics.
    pub line: usize,
    /// Byte payload for `Create`/`CreateNoEndl`/`Base64`.
    pub data: Vec<u8>,
    /// Extra ELF search directories attached by a `library` mask; carried
    /// through expansion for `Linked`/`LinkedAbs`/`LinkedGlob`/`Library`
    /// entries, unused otherwise.
    pub library_path: Vec<String>,
}

impl Entry {
    /// Default mode for a newly materialized entry of `kind`, used when the
    /// recipe line didn't specify one.
    pub fn default_mode(kind: Kind) -> u32 {
        match kind {
            Kind::Directory => 0o755,
            Kind::Symlink => 0o777,
            _ => 0o644,
        }
    }
}

/// Insertion-ordered keyed set of archive entries. Adding an Entry whose
/// `dst` already exists replaces it in place, preserving order.
#[derive(Default)]
pub struct EntryTable {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl EntryTable {
    /// New, empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry`, replacing any existing entry with the same `dst` in
    /// place. Returns the previous entry at that slot, if any.
    pub fn insert(&mut self, entry: Entry) -> Option<Entry> {
        debug_assert!(!entry.kind.is_virtual(), "virtual kinds must be expanded before insertion");
        if let Some(&i) = self.index.get(&entry.dst) {
            Some(std::mem::replace(&mut self.entries[i], entry))
        } else {
            self.index.insert(entry.dst.clone(), self.entries.len());
            self.entries.push(entry);
            None
        }
    }

    /// Append entries produced by concurrent ELF resolution, in
    /// worker-completion order, after all sequentially parsed entries.
    /// Equivalent to calling [`insert`] for each, in order.
    pub fn extend_ordered(&mut self, entries: impl IntoIterator<Item = Entry>) {
        for entry in entries {
            self.insert(entry);
        }
    }

    /// Look up the index of an existing `dst`, if any.
    pub fn index_of(&self, dst: &str) -> Option<usize> {
        self.index.get(dst).copied()
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Consume the table, yielding entries in insertion order.
    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(dst: &str, src: &str) -> Entry {
        Entry {
            kind: Kind::Regular,
            src: src.to_string(),
            dst: dst.to_string(),
            user: 0,
            group: 0,
            mode: 0o644,
            time: 0,
            heredoc: String::new(),
            line: 1,
            data: Vec::new(),
            library_path: Vec::new(),
        }
    }

    #[test]
    fn uniqueness_and_order_preserving_replacement() {
        let mut table = EntryTable::new();
        table.insert(entry("a", "1"));
        table.insert(entry("b", "1"));
        let k = table.index_of("a").unwrap();
        table.insert(entry("a", "2"));
        assert_eq!(table.len(), 2);
        assert_eq!(table.index_of("a").unwrap(), k);
        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries[k].src, "2");
    }
}
