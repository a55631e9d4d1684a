//! Program headers: the subset fields (`p_type`, `p_offset`, `p_vaddr`,
//! `p_filesz`) needed to find `PT_INTERP`/`PT_DYNAMIC` and to translate a
//! dynamic-section virtual address into a file offset via the `PT_LOAD`
//! segment that covers it.

use crate::class::ByteOrder;
use crate::class::Class;

/// `p_type` values this crate cares about.
pub const PT_LOAD: u32 = 1;
/// `p_type` values this crate cares about.
pub const PT_DYNAMIC: u32 = 2;
/// `p_type` values this crate cares about.
pub const PT_INTERP: u32 = 3;

/// One program header table entry.
#[derive(Debug, Clone, Copy)]
pub struct ProgramHeader {
    /// Segment kind (`PT_LOAD`, `PT_DYNAMIC`, `PT_INTERP`, ...).
    pub p_type: u32,
    /// Offset of the segment within the file.
    pub p_offset: u64,
    /// Virtual address the segment is mapped to at load time.
    pub p_vaddr: u64,
    /// Size of the segment within the file.
    pub p_filesz: u64,
}

impl ProgramHeader {
    /// Parse one entry from `buf`, which must hold exactly one header's
    /// worth of bytes (`Header::phentsize`, though this only reads the
    /// fixed prefix all known entsize values agree on).
    pub fn parse(buf: &[u8], class: Class, bo: ByteOrder) -> Self {
        match class {
            Class::Elf32 => ProgramHeader {
                p_type: bo.read_u32(&buf[0..4]),
                p_offset: bo.read_u32(&buf[4..8]) as u64,
                p_vaddr: bo.read_u32(&buf[8..12]) as u64,
                p_filesz: bo.read_u32(&buf[16..20]) as u64,
            },
            Class::Elf64 => ProgramHeader {
                p_type: bo.read_u32(&buf[0..4]),
                p_offset: bo.read_u64(&buf[8..16]),
                p_vaddr: bo.read_u64(&buf[16..24]),
                p_filesz: bo.read_u64(&buf[32..40]),
            },
        }
    }

    /// Whether virtual address `vaddr` falls within this segment's mapped range.
    pub fn contains_vaddr(&self, vaddr: u64) -> bool {
        vaddr >= self.p_vaddr && vaddr < self.p_vaddr + self.p_filesz
    }

    /// Translate a virtual address within this segment to a file offset.
    pub fn vaddr_to_offset(&self, vaddr: u64) -> u64 {
        self.p_offset + (vaddr - self.p_vaddr)
    }
}
