//! A fully decoded ELF file: interpreter path and dynamic section, read once
//! and retained after the underlying file handle is closed.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use crate::class::Class;
use crate::dynamic;
use crate::error::Error;
use crate::error::Result;
use crate::header::Header;
use crate::program_header::ProgramHeader;
use crate::program_header::PT_DYNAMIC;
use crate::program_header::PT_INTERP;
use crate::program_header::PT_LOAD;

/// Decoded `DT_NEEDED`/`DT_RPATH`/`DT_RUNPATH` entries from a `.dynamic` section.
#[derive(Debug, Clone, Default)]
pub struct DynamicInfo {
    /// `DT_NEEDED` names, in table order.
    pub needed: Vec<String>,
    /// `DT_RUNPATH`, colon-split.
    pub runpath: Vec<String>,
    /// `DT_RPATH`, colon-split.
    pub rpath: Vec<String>,
}

/// A parsed ELF file. `buf` is read once in [`ElfFile::open`] and dropped at
/// the end of that call; only the decoded `interpreter`/`dynamic` survive.
#[derive(Debug, Clone)]
pub struct ElfFile {
    path: PathBuf,
    class: Class,
    interpreter: Option<String>,
    dynamic: Option<DynamicInfo>,
}

impl ElfFile {
    /// Read and fully decode the ELF file at `path`.
    ///
    /// Returns [`Error::NotElf`] for a file that doesn't start with the ELF
    /// magic number; callers that want to treat non-ELF files as "no
    /// dependencies" rather than an error should match on that variant.
    pub fn open(path: &Path) -> Result<Self> {
        let buf = fs::read(path)?;
        let header = Header::parse(&buf, path)?;

        let entsize = header.phentsize as usize;
        let mut program_headers = Vec::with_capacity(header.phnum as usize);
        for i in 0..header.phnum as usize {
            let off = header.phoff as usize + i * entsize;
            if off + entsize > buf.len() {
                return Err(Error::Truncated(path.to_path_buf()));
            }
            program_headers.push(ProgramHeader::parse(&buf[off..off + entsize], header.class, header.byte_order));
        }

        let interpreter = program_headers
            .iter()
            .find(|p| p.p_type == PT_INTERP)
            .and_then(|p| {
                let start = p.p_offset as usize;
                let end = start.checked_add(p.p_filesz as usize)?;
                buf.get(start..end)
            })
            .map(|raw| String::from_utf8_lossy(raw).trim_end_matches('\0').to_string());

        let dynamic = Self::read_dynamic(&buf, &program_headers, &header, path)?;

        Ok(ElfFile {
            path: path.to_path_buf(),
            class: header.class,
            interpreter,
            dynamic,
        })
    }

    fn read_dynamic(buf: &[u8], phs: &[ProgramHeader], header: &Header, path: &Path) -> Result<Option<DynamicInfo>> {
        let Some(dyn_ph) = phs.iter().find(|p| p.p_type == PT_DYNAMIC) else {
            return Ok(None);
        };
        let esize = dynamic::entry_size(header.class);
        let start = dyn_ph.p_offset as usize;
        let end = start + dyn_ph.p_filesz as usize;
        let mut entries = Vec::new();
        let mut off = start;
        while off + esize <= end && off + esize <= buf.len() {
            let e = dynamic::parse_entry(&buf[off..off + esize], header.class, header.byte_order);
            if e.tag == dynamic::DT_NULL {
                break;
            }
            entries.push(e);
            off += esize;
        }

        let Some(strtab_vaddr) = entries.iter().find(|e| e.tag == dynamic::DT_STRTAB).map(|e| e.val) else {
            return Ok(Some(DynamicInfo::default()));
        };
        let load = phs
            .iter()
            .find(|p| p.p_type == PT_LOAD && p.contains_vaddr(strtab_vaddr))
            .ok_or_else(|| Error::BadStringTable(path.to_path_buf()))?;
        let strtab_off = load.vaddr_to_offset(strtab_vaddr) as usize;

        let read_str = |rel: u64| -> Result<String> {
            let start = strtab_off.checked_add(rel as usize).ok_or_else(|| Error::BadStringTable(path.to_path_buf()))?;
            if start >= buf.len() {
                return Err(Error::BadStringTable(path.to_path_buf()));
            }
            let end = buf[start..].iter().position(|&b| b == 0).map(|p| start + p).unwrap_or(buf.len());
            Ok(String::from_utf8_lossy(&buf[start..end]).into_owned())
        };

        let mut info = DynamicInfo::default();
        for e in &entries {
            match e.tag {
                dynamic::DT_NEEDED => info.needed.push(read_str(e.val)?),
                dynamic::DT_RUNPATH => info.runpath = read_str(e.val)?.split(':').filter(|s| !s.is_empty()).map(String::from).collect(),
                dynamic::DT_RPATH => info.rpath = read_str(e.val)?.split(':').filter(|s| !s.is_empty()).map(String::from).collect(),
                _ => {}
            }
        }
        Ok(Some(info))
    }

    /// The file this was decoded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 32- or 64-bit class.
    pub fn class(&self) -> Class {
        self.class
    }

    /// `PT_INTERP`'s content, if the file has one.
    pub fn interpreter(&self) -> Option<&str> {
        self.interpreter.as_deref()
    }

    /// The decoded dynamic section, if the file is dynamically linked at all.
    pub fn dynamic(&self) -> Option<&DynamicInfo> {
        self.dynamic.as_ref()
    }
}
