//! `.dynamic` section entries: just the tags the dependency walk reads.

use crate::class::ByteOrder;
use crate::class::Class;

/// `d_tag` values this crate reads out of the dynamic table.
pub const DT_NULL: i64 = 0;
/// `d_tag` values this crate reads out of the dynamic table.
pub const DT_NEEDED: i64 = 1;
/// `d_tag` values this crate reads out of the dynamic table.
pub const DT_STRTAB: i64 = 5;
/// `d_tag` values this crate reads out of the dynamic table.
pub const DT_RPATH: i64 = 15;
/// `d_tag` values this crate reads out of the dynamic table.
pub const DT_RUNPATH: i64 = 29;

/// One raw `(d_tag, d_val)` pair.
#[derive(Debug, Clone, Copy)]
pub struct DynamicEntry {
    /// The tag.
    pub tag: i64,
    /// The value or pointer, tag-dependent.
    pub val: u64,
}

/// Size in bytes of one dynamic table entry for `class`.
pub fn entry_size(class: Class) -> usize {
    match class {
        Class::Elf32 => 8,
        Class::Elf64 => 16,
    }
}

/// Parse one dynamic table entry from `buf`.
pub fn parse_entry(buf: &[u8], class: Class, bo: ByteOrder) -> DynamicEntry {
    match class {
        Class::Elf32 => DynamicEntry {
            tag: bo.read_u32(&buf[0..4]) as i32 as i64,
            val: bo.read_u32(&buf[4..8]) as u64,
        },
        Class::Elf64 => DynamicEntry {
            tag: bo.read_u64(&buf[0..8]) as i64,
            val: bo.read_u64(&buf[8..16]),
        },
    }
}
