//! Orchestration: parses a recipe document and drives masks, variables, glob
//! expansion, and ELF resolution to produce a finished [`EntryTable`].

use std::os::unix::fs::MetadataExt;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::path::PathBuf;

use crate::fs;

use crate::config::Settings;
use crate::entry::Entry;
use crate::entry::EntryTable;
use crate::entry::Kind;
use crate::glob_match;
use crate::mask::Addr;
use crate::mask::ClearAddr;
use crate::mask::MaskKind;
use crate::mask::MaskStack;
use crate::parser::tokenize;
use crate::parser::RawLine;
use crate::path as pathutil;
use crate::resolver::ElfResolveOptions;
use crate::resolver::ElfResolver;
use crate::resolver::ResolvedElf;
use crate::vars::VariableMap;
use crate::Error;
use crate::Result;

/// A queued-but-not-yet-resolved ELF dependency walk, captured at the point
/// `add_linked_from_host` dispatched it. Carries its own [`MaskStack`]
/// snapshot so a concurrent resolution applies the masks that were active
/// at dispatch time, not whatever the parser has mutated them to by the
/// time the result comes back (see §5's "Concurrent mask snapshotting"
/// design note).
struct PendingElf {
    line: usize,
    target_path: PathBuf,
    masks: MaskStack,
    extra_search_dirs: Vec<String>,
}

/// Find the first `{`/`}` pair in `s` that isn't backslash-escaped. Regex-glob
/// patterns use `\{...\}` to pass a literal brace through to the regex
/// engine (e.g. a `{2,4}` quantifier) without triggering fan-out; an
/// unescaped `{` still triggers it, per the recipe grammar's brace
/// expansion rule.
fn find_unescaped_brace_pair(s: &str) -> Option<(usize, usize)> {
    let bytes = s.as_bytes();
    let mut open = None;
    for (i, &b) in bytes.iter().enumerate() {
        let escaped = i > 0 && bytes[i - 1] == b'\\';
        if escaped {
            continue;
        }
        match b {
            b'{' if open.is_none() => open = Some(i),
            b'}' => {
                if let Some(o) = open {
                    return Some((o, i));
                }
            }
            _ => {}
        }
    }
    None
}

/// Expand one level of non-nested `{a,b,c}` brace alternation in `s`.
fn brace_variants(s: &str) -> Vec<String> {
    let Some((open, close)) = find_unescaped_brace_pair(s) else {
        return vec![s.to_string()];
    };
    let prefix = &s[..open];
    let inner = &s[open + 1..close];
    let suffix = &s[close + 1..];
    inner.split(',').map(|part| format!("{prefix}{part}{suffix}")).collect()
}

fn cartesian_expand(fields: &[String]) -> Vec<Vec<String>> {
    let mut result = vec![Vec::new()];
    for field in fields {
        let variants = brace_variants(field);
        let mut next = Vec::with_capacity(result.len() * variants.len());
        for combo in &result {
            for v in &variants {
                let mut c = combo.clone();
                c.push(v.clone());
                next.push(c);
            }
        }
        result = next;
    }
    result
}

fn parse_mode(s: &str, default: u32) -> u32 {
    if s.is_empty() || s == "-" {
        return default;
    }
    u32::from_str_radix(s, 8).unwrap_or(default)
}

fn parse_int(s: &str, default: i64) -> i64 {
    if s.is_empty() || s == "-" {
        return default;
    }
    s.parse().unwrap_or(default)
}

fn field(fields: &[String], i: usize) -> &str {
    fields.get(i).map(|s| s.as_str()).unwrap_or("")
}

/// Ties a [`VariableMap`], [`MaskStack`], and [`EntryTable`] together and
/// drives the whole add-pipeline for a recipe document.
pub struct Recipe {
    settings: Settings,
    vars: VariableMap,
    masks: MaskStack,
    table: EntryTable,
    resolver: Option<Box<dyn ElfResolver>>,
    resolved_once: std::collections::HashSet<PathBuf>,
    pending_elf: Vec<PendingElf>,
}

impl Recipe {
    /// Start a new recipe run under `settings`, optionally wired to an ELF
    /// resolver for `L`/`LA`/`rL`/`i` entries.
    pub fn new(settings: Settings, resolver: Option<Box<dyn ElfResolver>>) -> Self {
        let vars = VariableMap::with_pinned(settings.pinned_vars.clone());
        Recipe {
            settings,
            vars,
            masks: MaskStack::new(),
            table: EntryTable::new(),
            resolver,
            resolved_once: std::collections::HashSet::new(),
            pending_elf: Vec::new(),
        }
    }

    /// Parse and apply every line of `text` in order. May be called more
    /// than once to run several recipe files through the same table; ELF
    /// resolution queued by any of them is only drained by [`into_table`].
    ///
    /// [`into_table`]: Recipe::into_table
    pub fn parse(&mut self, text: &str) -> Result<()> {
        for raw in tokenize(text)? {
            self.add(&raw)?;
        }
        Ok(())
    }

    /// Finish the run: resolve every queued ELF dependency walk (sequentially
    /// or, when `settings.concurrent` is set, on a bounded worker pool), fold
    /// the results into the table, and yield it.
    pub fn into_table(mut self) -> Result<EntryTable> {
        self.drain_pending_elf()?;
        Ok(self.table)
    }

    fn rootfs_join(&self, rel: &str) -> String {
        if self.settings.rootfs.as_os_str().is_empty() {
            format!("/{}", rel.trim_start_matches('/'))
        } else {
            self.settings
                .rootfs
                .join(rel.trim_start_matches('/'))
                .to_string_lossy()
                .into_owned()
        }
    }

    fn add(&mut self, raw: &RawLine) -> Result<()> {
        if raw.fields.is_empty() {
            return Ok(());
        }
        let replaced: Vec<String> = raw.fields.iter().map(|f| self.vars.replace(f)).collect();
        let code = replaced[0].as_str();

        match code {
            "$" => return self.directive_var(raw.line, &replaced),
            "mr" | "mi" | "mI" | "mm" | "mt" | "ml" => return self.directive_mask_set(raw.line, code, &replaced),
            "mc" => return self.directive_mask_clear(raw.line, &replaced),
            _ => {}
        }

        let Some(kind) = Kind::from_code(code) else {
            return Err(Error::invalid_line(raw.line, format!("unknown entry type {code:?}")));
        };

        for mut variant in cartesian_expand(&replaced) {
            if code == "fr" {
                if let Some(src) = variant.get_mut(1) {
                    *src = self.rootfs_join(src);
                }
            }
            let result = self.add_one(kind, raw.line, &variant);
            match result {
                Ok(()) => {}
                Err(e) if raw.failable => log::warn!("line {}: {e} (failable, skipped)", raw.line),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn directive_var(&mut self, line: usize, fields: &[String]) -> Result<()> {
        let name = field(fields, 1);
        if name.is_empty() {
            return Err(Error::invalid_line(line, "$ directive needs a variable name"));
        }
        let value = fields.get(2).map(|s| s.as_str());
        self.vars.define(name, value);
        Ok(())
    }

    fn parse_addr(s: &str) -> Option<Addr> {
        if s == "-" {
            Some(Addr::Append)
        } else {
            s.parse::<usize>().ok().map(Addr::At)
        }
    }

    fn directive_mask_set(&mut self, line: usize, code: &str, fields: &[String]) -> Result<()> {
        let addr_field = field(fields, 1);
        let Some(addr) = Self::parse_addr(addr_field) else {
            return Err(Error::invalid_line(line, format!("{code} needs an index or -")));
        };
        let pattern_str = field(fields, 2);
        let pattern = regex::Regex::new(pattern_str)?;
        let kind = match code {
            "mr" => MaskKind::Replace {
                pattern,
                replacement: field(fields, 3).to_string(),
            },
            "mi" => MaskKind::Ignore { pattern, negate: false },
            "mI" => MaskKind::Ignore { pattern, negate: true },
            "mm" => {
                let mode_s = field(fields, 3);
                let uid_s = field(fields, 4);
                let gid_s = field(fields, 5);
                MaskKind::Mode {
                    pattern,
                    mode: (!mode_s.is_empty() && mode_s != "-").then(|| parse_mode(mode_s, 0)),
                    uid: (!uid_s.is_empty() && uid_s != "-").then(|| parse_int(uid_s, 0)),
                    gid: (!gid_s.is_empty() && gid_s != "-").then(|| parse_int(gid_s, 0)),
                }
            }
            "mt" => MaskKind::Time {
                pattern,
                time: parse_int(field(fields, 3), 0),
            },
            "ml" => MaskKind::Library {
                pattern,
                dirs: fields.get(3..).map(|s| s.to_vec()).unwrap_or_default(),
            },
            _ => unreachable!(),
        };
        self.masks.set(addr, kind)
    }

    fn directive_mask_clear(&mut self, line: usize, fields: &[String]) -> Result<()> {
        let arg = field(fields, 1);
        if fields.len() > 2 {
            return Err(Error::invalid_line(line, "mc takes at most one argument"));
        }
        if arg.is_empty() {
            self.masks.clear(None)
        } else if let Some(n) = arg.strip_prefix('-') {
            let n = n.parse::<usize>().map_err(|_| Error::invalid_line(line, "mc argument must be numeric"))?;
            self.masks.clear(Some(ClearAddr::LastN(n)))
        } else {
            let n = arg.parse::<usize>().map_err(|_| Error::invalid_line(line, "mc argument must be numeric"))?;
            self.masks.clear(Some(ClearAddr::At(n)))
        }
    }

    /// Core of [`insert_physical`], taking its table/mask-stack explicitly so
    /// the concurrent ELF drain can apply a job's snapshotted masks against
    /// the live table without going through `&mut self`.
    ///
    /// [`insert_physical`]: Recipe::insert_physical
    #[allow(clippy::too_many_arguments)]
    fn insert_physical_ext(
        table: &mut EntryTable,
        masks: &MaskStack,
        warn_replace: bool,
        kind: Kind,
        src: String,
        dst: String,
        mode: u32,
        user: i64,
        group: i64,
        time: i64,
        line: usize,
        data: Vec<u8>,
        heredoc: String,
    ) -> Option<crate::mask::MaskEffect> {
        let effect = masks.apply(pathutil::strip_leading_slash(&pathutil::clean(&dst)));
        if effect.ignored {
            if warn_replace {
                log::debug!("line {line}: {dst} ignored by mask");
            }
            return None;
        }
        if table.index_of(&effect.dst).is_some() && warn_replace {
            log::warn!("line {line}: replacing existing entry {}", effect.dst);
        }
        table.insert(Entry {
            kind,
            src,
            dst: effect.dst.clone(),
            user: effect.uid.unwrap_or(user),
            group: effect.gid.unwrap_or(group),
            mode: effect.mode.unwrap_or(mode),
            time: effect.time.unwrap_or(time),
            heredoc,
            line,
            data,
            library_path: effect.library_dirs.clone(),
        });
        Some(effect)
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_physical(
        &mut self,
        kind: Kind,
        src: String,
        dst: String,
        mode: u32,
        user: i64,
        group: i64,
        time: i64,
        line: usize,
        data: Vec<u8>,
        heredoc: String,
    ) -> Option<crate::mask::MaskEffect> {
        Self::insert_physical_ext(
            &mut self.table,
            &self.masks,
            self.settings.warn_replace,
            kind,
            src,
            dst,
            mode,
            user,
            group,
            time,
            line,
            data,
            heredoc,
        )
    }

    /// `fields[i]`, falling back to `default` if absent, `"-"`, or empty.
    fn default_field<'a>(fields: &'a [String], i: usize, default: &'a str) -> &'a str {
        match fields.get(i).map(|s| s.as_str()) {
            Some(s) if !s.is_empty() && s != "-" => s,
            _ => default,
        }
    }

    /// Dispatch one already brace-expanded recipe line by its [`Kind`],
    /// reading fields in that type's own column layout (see §6 of the
    /// recipe grammar): single-source types (`d`) carry only a name column
    /// before mode/uid/gid; two-source types (`f`, `l`, `L`, ...) carry
    /// `src` then an optional `dst` (defaulting to `src`); create-family
    /// types carry `dst` then mode/uid/gid then the data/heredoc column;
    /// the glob/recursive/ELF families omit the mode column entirely,
    /// since their materialized entries take mode from the host file.
    fn add_one(&mut self, kind: Kind, line: usize, fields: &[String]) -> Result<()> {
        match kind {
            Kind::Directory => {
                let dst_raw = field(fields, 1).to_string();
                let mode = parse_mode(field(fields, 2), Entry::default_mode(kind));
                let user = parse_int(field(fields, 3), 0);
                let group = parse_int(field(fields, 4), 0);
                self.insert_physical(kind, String::new(), dst_raw, mode, user, group, 0, line, Vec::new(), String::new());
            }
            Kind::Regular | Kind::Symlink => {
                let src = field(fields, 1).to_string();
                let dst_raw = Self::default_field(fields, 2, &src).to_string();
                let mode = parse_mode(field(fields, 3), Entry::default_mode(kind));
                let user = parse_int(field(fields, 4), 0);
                let group = parse_int(field(fields, 5), 0);
                self.insert_physical(kind, src, dst_raw, mode, user, group, 0, line, Vec::new(), String::new());
            }
            Kind::Create | Kind::CreateNoEndl | Kind::Base64 => {
                let dst_raw = field(fields, 1).to_string();
                let mode = parse_mode(field(fields, 2), Entry::default_mode(kind));
                let user = parse_int(field(fields, 3), 0);
                let group = parse_int(field(fields, 4), 0);
                let data_field = field(fields, 5).to_string();
                let data = match kind {
                    Kind::Create => {
                        let mut d = data_field.into_bytes();
                        if !d.ends_with(b"\n") {
                            d.push(b'\n');
                        }
                        d
                    }
                    Kind::CreateNoEndl => data_field.into_bytes(),
                    // Kept as the raw base64 text, not decoded: the table-resident
                    // Entry's `data` is the recipe's literal payload column for
                    // every create-family kind, and decoding is the archive
                    // writer's job at write time.
                    Kind::Base64 => data_field.into_bytes(),
                    _ => unreachable!(),
                };
                self.insert_physical(kind, String::new(), dst_raw, mode, user, group, 0, line, data, String::new());
            }
            Kind::Recursive | Kind::RecursiveRel => {
                let src = field(fields, 1).to_string();
                let dst_raw = Self::default_field(fields, 2, &src).to_string();
                let host_root = if kind == Kind::Recursive {
                    PathBuf::from(self.rootfs_join(&src))
                } else {
                    PathBuf::from(&src)
                };
                self.add_recursive(&host_root, &dst_raw, line)?;
            }
            Kind::Glob | Kind::GlobRel => {
                if !self.settings.glob_expand {
                    return Ok(());
                }
                let src = field(fields, 1).to_string();
                let dst_raw = Self::default_field(fields, 2, &src).to_string();
                let user = parse_int(field(fields, 3), 0);
                let group = parse_int(field(fields, 4), 0);
                let (host_root, strip_prefix) = if kind == Kind::Glob {
                    (self.settings.rootfs.clone(), true)
                } else {
                    (PathBuf::new(), false)
                };
                let pattern = if strip_prefix { src.trim_start_matches('/').to_string() } else { src.clone() };
                let matches = glob_match::expand(&host_root, &pattern)?;
                if matches.is_empty() && self.settings.warn_empty_glob {
                    log::warn!("line {line}: glob {src:?} matched nothing");
                }
                for rel in matches {
                    let host_path = host_root.join(&rel);
                    let dst = pathutil::join(&[&dst_raw, &rel]);
                    self.add_auto_one(&host_path, &dst, "-", user, group, line)?;
                }
            }
            Kind::Auto | Kind::AutoRel => {
                let src = field(fields, 1).to_string();
                let dst_raw = Self::default_field(fields, 2, &src).to_string();
                let mode_s = field(fields, 3).to_string();
                let user = parse_int(field(fields, 4), 0);
                let group = parse_int(field(fields, 5), 0);
                let host_path = if kind == Kind::Auto {
                    PathBuf::from(self.rootfs_join(&src))
                } else {
                    PathBuf::from(&src)
                };
                self.add_auto_one(&host_path, &dst_raw, &mode_s, user, group, line)?;
            }
            Kind::Linked | Kind::LinkedAbs => {
                let src = field(fields, 1).to_string();
                let dst_raw = Self::default_field(fields, 2, &src).to_string();
                let user = parse_int(field(fields, 3), 0);
                let group = parse_int(field(fields, 4), 0);
                self.add_linked(kind, &src, &dst_raw, user, group, line)?;
            }
            Kind::Library => {
                // `i src uid gid`: no dst column, the basename-resolved path
                // itself becomes the archive name.
                let src = field(fields, 1).to_string();
                let user = parse_int(field(fields, 2), 0);
                let group = parse_int(field(fields, 3), 0);
                let dst_raw = src.clone();
                self.add_linked(kind, &src, &dst_raw, user, group, line)?;
            }
            Kind::LinkedGlob => {
                let src = field(fields, 1).to_string();
                let dst_raw = Self::default_field(fields, 2, &src).to_string();
                let user = parse_int(field(fields, 3), 0);
                let group = parse_int(field(fields, 4), 0);
                let host_root = self.settings.rootfs.join(src.trim_start_matches('/'));
                for entry in fs::read_dir(&host_root).map_err(Error::Io)? {
                    let entry = entry.map_err(Error::Io)?;
                    if !entry.file_type().map_err(Error::Io)?.is_file() {
                        continue;
                    }
                    let name = entry.file_name().to_string_lossy().into_owned();
                    let rel_src = pathutil::join(&[&src, &name]);
                    let dst = pathutil::join(&[&dst_raw, &name]);
                    self.add_linked(Kind::Linked, &rel_src, &dst, user, group, line)?;
                }
            }
            Kind::Path => {
                let src = field(fields, 1).to_string();
                let dst_raw = Self::default_field(fields, 2, &src).to_string();
                let user = parse_int(field(fields, 3), 0);
                let group = parse_int(field(fields, 4), 0);
                if src.starts_with('/') {
                    let host_path = PathBuf::from(self.rootfs_join(&src));
                    return self.add_linked_from_host(&host_path, &dst_raw, "-", user, group, line);
                }
                let search = if self.settings.path_dirs.is_empty() {
                    std::env::var("PATH").unwrap_or_default().split(':').map(str::to_string).collect()
                } else {
                    self.settings.path_dirs.clone()
                };
                let mut found = None;
                for dir in &search {
                    let candidate = self.settings.rootfs.join(dir.trim_start_matches('/')).join(&src);
                    if candidate.is_file() {
                        found = Some(candidate);
                        break;
                    }
                }
                match found {
                    Some(host_path) => self.add_linked_from_host(&host_path, &dst_raw, "-", user, group, line)?,
                    None => return Err(Error::NotFound(PathBuf::from(&src))),
                }
            }
        }
        Ok(())
    }

    fn add_auto_one(&mut self, host_path: &Path, dst: &str, mode_s: &str, user: i64, group: i64, line: usize) -> Result<()> {
        if !self.settings.file_expand {
            let mode = parse_mode(mode_s, Entry::default_mode(Kind::Regular));
            self.insert_physical(Kind::Regular, host_path.to_string_lossy().into_owned(), dst.to_string(), mode, user, group, 0, line, Vec::new(), String::new());
            return Ok(());
        }
        let meta = fs::symlink_metadata(host_path).map_err(|_| Error::NotFound(host_path.to_path_buf()))?;
        if meta.file_type().is_symlink() {
            let target = fs::read_link(host_path)?;
            let mode = parse_mode(mode_s, Entry::default_mode(Kind::Symlink));
            self.insert_physical(Kind::Symlink, target.to_string_lossy().into_owned(), dst.to_string(), mode, user, group, meta.mtime(), line, Vec::new(), String::new());
        } else {
            let mode = parse_mode(mode_s, meta.permissions().mode() & 0o7777);
            self.insert_physical(Kind::Regular, host_path.to_string_lossy().into_owned(), dst.to_string(), mode, user, group, meta.mtime(), line, Vec::new(), String::new());
        }
        Ok(())
    }

    fn add_recursive(&mut self, host_root: &Path, dst_root: &str, line: usize) -> Result<()> {
        let mut stack = vec![(host_root.to_path_buf(), dst_root.to_string())];
        while let Some((host, dst)) = stack.pop() {
            let meta = fs::symlink_metadata(&host).map_err(|_| Error::NotFound(host.clone()))?;
            if meta.is_dir() {
                self.insert_physical(Kind::Directory, String::new(), dst.clone(), meta.permissions().mode() & 0o7777, meta.uid() as i64, meta.gid() as i64, meta.mtime(), line, Vec::new(), String::new());
                for entry in fs::read_dir(&host).map_err(Error::Io)? {
                    let entry = entry.map_err(Error::Io)?;
                    let name = entry.file_name().to_string_lossy().into_owned();
                    stack.push((host.join(&name), pathutil::join(&[&dst, &name])));
                }
            } else if meta.file_type().is_symlink() {
                let target = fs::read_link(&host)?;
                self.insert_physical(Kind::Symlink, target.to_string_lossy().into_owned(), dst, 0o777, meta.uid() as i64, meta.gid() as i64, meta.mtime(), line, Vec::new(), String::new());
            } else {
                self.insert_physical(Kind::Regular, host.to_string_lossy().into_owned(), dst, meta.permissions().mode() & 0o7777, meta.uid() as i64, meta.gid() as i64, meta.mtime(), line, Vec::new(), String::new());
            }
        }
        Ok(())
    }

    fn add_linked(&mut self, kind: Kind, src: &str, dst: &str, user: i64, group: i64, line: usize) -> Result<()> {
        let host_path = match kind {
            Kind::Library => {
                let dirs = if self.settings.rootfs.as_os_str().is_empty() {
                    vec!["/lib".to_string(), "/usr/lib".to_string(), "/lib64".to_string(), "/usr/lib64".to_string()]
                } else {
                    vec!["lib", "usr/lib", "lib64", "usr/lib64"].into_iter().map(String::from).collect()
                };
                let mut found = None;
                for dir in dirs {
                    let candidate = self.settings.rootfs.join(dir.trim_start_matches('/')).join(src);
                    if candidate.is_file() {
                        found = Some(candidate);
                        break;
                    }
                }
                found.ok_or_else(|| Error::NotFound(PathBuf::from(src)))?
            }
            _ => PathBuf::from(self.rootfs_join(src)),
        };
        self.add_linked_from_host(&host_path, dst, "-", user, group, line)
    }

    /// Walk `path` for symlink hops under the rootfs prefix, materializing
    /// each hop as its own `Symlink` entry so the archive mirrors the real
    /// link chain (e.g. a versioned soname pointing at its real file)
    /// instead of silently flattening it away. Returns the fully resolved
    /// host path.
    fn expand_and_emit_hops_ext(
        table: &mut EntryTable,
        masks: &MaskStack,
        warn_replace: bool,
        rootfs: &Path,
        path: &Path,
        line: usize,
    ) -> Result<PathBuf> {
        let rootfs_str = rootfs.to_string_lossy().into_owned();
        let path_str = path.to_string_lossy().into_owned();
        let mut hops = Vec::new();
        let resolved = pathutil::expand(&path_str, &rootfs_str, |hop| hops.push(hop))?;
        for hop in hops {
            let full = rootfs.join(&hop.link_path);
            let meta = fs::symlink_metadata(&full).map_err(|_| Error::NotFound(full.clone()))?;
            Self::insert_physical_ext(
                table,
                masks,
                warn_replace,
                Kind::Symlink,
                hop.target,
                hop.link_path,
                meta.permissions().mode() & 0o7777,
                0,
                0,
                meta.mtime(),
                line,
                Vec::new(),
                String::new(),
            );
        }
        Ok(PathBuf::from(resolved))
    }

    fn expand_and_emit_hops(&mut self, path: &Path, line: usize) -> Result<PathBuf> {
        Self::expand_and_emit_hops_ext(
            &mut self.table,
            &self.masks,
            self.settings.warn_replace,
            &self.settings.rootfs,
            path,
            line,
        )
    }

    /// Fold a resolved ELF's dependency list into `table`, materializing any
    /// symlink hops and the final regular-file entry for each dependency.
    /// Shared by the sequential path (called directly from
    /// `add_linked_from_host`) and the concurrent drain (called once per
    /// finished job, against that job's snapshotted masks).
    #[allow(clippy::too_many_arguments)]
    fn insert_dependencies(
        table: &mut EntryTable,
        masks: &MaskStack,
        warn_replace: bool,
        elf_fallback: bool,
        rootfs: &Path,
        target_path: &Path,
        resolved: ResolvedElf,
        line: usize,
    ) -> Result<()> {
        if !resolved.is_dynamic {
            return Ok(());
        }
        // The target's own interpreter (the dynamic linker itself) is part of
        // "the target file itself and its interpreter" per the resolver's
        // contract; fold it in the same way as any other resolved dependency
        // so it lands in the archive unconditionally rather than only when
        // some unrelated recipe line happens to add it.
        let dep_paths = resolved.interpreter.into_iter().chain(resolved.dependencies.into_iter().map(|d| d.path));
        for dep_path in dep_paths {
            if dep_path == target_path {
                continue;
            }
            let dep_final = match Self::expand_and_emit_hops_ext(table, masks, warn_replace, rootfs, &dep_path, line) {
                Ok(p) => p,
                Err(_) if elf_fallback => {
                    log::warn!("line {line}: missing dependency {:?}, skipped", dep_path);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let dep_meta = match fs::symlink_metadata(&dep_final) {
                Ok(m) => m,
                Err(_) if elf_fallback => {
                    log::warn!("line {line}: missing dependency {:?}, skipped", dep_final);
                    continue;
                }
                Err(_) => return Err(Error::NotFound(dep_final.clone())),
            };
            let rel = dep_final.strip_prefix(rootfs).unwrap_or(&dep_final).to_string_lossy().into_owned();
            Self::insert_physical_ext(
                table,
                masks,
                warn_replace,
                Kind::Regular,
                dep_final.to_string_lossy().into_owned(),
                rel,
                dep_meta.permissions().mode() & 0o7777,
                0,
                0,
                dep_meta.mtime(),
                line,
                Vec::new(),
                String::new(),
            );
        }
        Ok(())
    }

    fn add_linked_from_host(&mut self, host_path: &Path, dst: &str, mode_s: &str, user: i64, group: i64, line: usize) -> Result<()> {
        let target_path = self.expand_and_emit_hops(host_path, line)?;
        let meta = fs::symlink_metadata(&target_path).map_err(|_| Error::NotFound(target_path.clone()))?;
        let mode = parse_mode(mode_s, meta.permissions().mode() & 0o7777);
        let effect = self.insert_physical(
            Kind::Regular,
            target_path.to_string_lossy().into_owned(),
            dst.to_string(),
            mode,
            user,
            group,
            meta.mtime(),
            line,
            Vec::new(),
            String::new(),
        );
        let extra_search_dirs = effect.map(|e| e.library_dirs).unwrap_or_default();

        if !self.settings.elf_expand {
            return Ok(());
        }
        if self.resolver.is_none() {
            return Ok(());
        }
        if self.settings.elf_once && !self.resolved_once.insert(target_path.clone()) {
            return Ok(());
        }

        if self.settings.concurrent {
            self.pending_elf.push(PendingElf {
                line,
                target_path,
                masks: self.masks.clone(),
                extra_search_dirs,
            });
            return Ok(());
        }

        let resolver = self.resolver.as_ref().expect("checked above");
        let options = ElfResolveOptions {
            rootfs: self.settings.rootfs.clone(),
            extra_search_dirs,
            ld_so_conf: self.settings.ld_so_conf.clone(),
            resolve_once: self.settings.elf_once,
        };
        let resolved = resolver.resolve(&target_path, &options).map_err(Error::Elf)?;
        Self::insert_dependencies(
            &mut self.table,
            &self.masks,
            self.settings.warn_replace,
            self.settings.elf_fallback,
            &self.settings.rootfs,
            &target_path,
            resolved,
            line,
        )
    }

    /// Resolve every queued [`PendingElf`] job and fold its dependencies into
    /// the table. Sequentially when `settings.concurrent` is off; otherwise
    /// on a `rayon` pool sized to `settings.num_workers` (0 meaning rayon's
    /// default), collecting results in worker-completion order via an mpsc
    /// channel rather than request order, per the concurrency model's
    /// "ELF-derived entries appended in completion order" rule. Each job
    /// carries its own mask snapshot, so results are folded back against
    /// the masks active when the job was dispatched, not the (possibly
    /// further-mutated) live `self.masks`.
    fn drain_pending_elf(&mut self) -> Result<()> {
        let jobs = std::mem::take(&mut self.pending_elf);
        if jobs.is_empty() {
            return Ok(());
        }
        let Some(resolver) = self.resolver.as_ref() else {
            return Ok(());
        };

        let rootfs = self.settings.rootfs.clone();
        let ld_so_conf = self.settings.ld_so_conf.clone();
        let resolve_once = self.settings.elf_once;
        let elf_fallback = self.settings.elf_fallback;
        let warn_replace = self.settings.warn_replace;

        let resolve_one = |job: &PendingElf| -> std::result::Result<ResolvedElf, Box<dyn std::error::Error + Send + Sync>> {
            let options = ElfResolveOptions {
                rootfs: rootfs.clone(),
                extra_search_dirs: job.extra_search_dirs.clone(),
                ld_so_conf: ld_so_conf.clone(),
                resolve_once,
            };
            resolver.resolve(&job.target_path, &options)
        };

        let mut outcomes: Vec<(PendingElf, std::result::Result<ResolvedElf, Box<dyn std::error::Error + Send + Sync>>)> = Vec::with_capacity(jobs.len());

        if self.settings.concurrent {
            let mut builder = rayon::ThreadPoolBuilder::new();
            if self.settings.num_workers > 0 {
                builder = builder.num_threads(self.settings.num_workers);
            }
            let pool = builder
                .build()
                .map_err(|e| Error::Elf(Box::new(std::io::Error::new(std::io::ErrorKind::Other, e))))?;
            let (tx, rx) = std::sync::mpsc::channel();
            pool.scope(|scope| {
                for job in jobs {
                    let tx = tx.clone();
                    let resolve_one = &resolve_one;
                    scope.spawn(move |_| {
                        let result = resolve_one(&job);
                        let _ = tx.send((job, result));
                    });
                }
            });
            drop(tx);
            outcomes.extend(rx.into_iter());
        } else {
            for job in jobs {
                let result = resolve_one(&job);
                outcomes.push((job, result));
            }
        }

        let mut errors = Vec::new();
        for (job, result) in outcomes {
            let resolved = match result {
                Ok(r) => r,
                Err(e) => {
                    errors.push((job.line, Error::Elf(e)));
                    continue;
                }
            };
            if let Err(e) = Self::insert_dependencies(
                &mut self.table,
                &job.masks,
                warn_replace,
                elf_fallback,
                &rootfs,
                &job.target_path,
                resolved,
                job.line,
            ) {
                errors.push((job.line, e));
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.pop().unwrap().1),
            _ => Err(Error::Multi(errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brace_variants_splits_one_level() {
        assert_eq!(brace_variants("lib/{a,b}.so"), vec!["lib/a.so", "lib/b.so"]);
        assert_eq!(brace_variants("plain"), vec!["plain"]);
    }

    #[test]
    fn brace_variants_leaves_escaped_braces_alone() {
        assert_eq!(brace_variants(r"lib/.*\.so\{2,4\}$"), vec![r"lib/.*\.so\{2,4\}$"]);
    }

    #[test]
    fn directory_and_file_entries_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), b"hi").unwrap();
        let mut settings = Settings::default();
        settings.rootfs = dir.path().to_path_buf();
        let mut recipe = Recipe::new(settings, None);
        recipe
            .parse("d / 0755 0 0\nf /a /bin/a 0644 0 0\n")
            .unwrap();
        let table = recipe.into_table().unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.index_of("bin/a").is_some());
    }

    #[test]
    fn mc_with_index_removes_exactly_that_mask() {
        let mut recipe = Recipe::new(Settings::default(), None);
        recipe.parse("mr - ^a a2\nmr - ^b b2\nmc 0\n").unwrap();
        assert_eq!(recipe.masks.len(), 1);
    }

    #[test]
    fn mc_with_negative_argument_drops_last_n() {
        let mut recipe = Recipe::new(Settings::default(), None);
        recipe.parse("mr - ^a a2\nmr - ^b b2\nmc -2\n").unwrap();
        assert_eq!(recipe.masks.len(), 0);
    }

    #[test]
    fn mask_replace_applies_before_insertion() {
        let mut recipe = Recipe::new(Settings::default(), None);
        recipe.parse("mr - ^usr/ \nd /usr/lib 0755 0 0\n").unwrap();
        let table = recipe.into_table().unwrap();
        assert!(table.index_of("lib").is_some());
    }

    #[test]
    fn heredoc_create_strips_to_data_with_trailing_newline() {
        let mut recipe = Recipe::new(Settings::default(), None);
        recipe.parse("c /motd 0644 0 0 <<EOF\nhello\nEOF\n").unwrap();
        let table = recipe.into_table().unwrap();
        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries[0].data, b"hello\n");
    }
}
