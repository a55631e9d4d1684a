//! ELF class (word size) and byte order, and the handful of primitive reads
//! that depend on both.

use std::path::Path;

use crate::error::Error;
use crate::error::Result;

/// `EI_CLASS`: whether offsets/addresses are 32- or 64-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    /// `ELFCLASS32`.
    Elf32,
    /// `ELFCLASS64`.
    Elf64,
}

impl Class {
    pub(crate) fn from_byte(b: u8, path: &Path) -> Result<Self> {
        match b {
            1 => Ok(Class::Elf32),
            2 => Ok(Class::Elf64),
            _ => Err(Error::UnsupportedClass(path.to_path_buf())),
        }
    }
}

/// `EI_DATA`: whether multi-byte integers are little- or big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// `ELFDATA2LSB`.
    Little,
    /// `ELFDATA2MSB`.
    Big,
}

impl ByteOrder {
    pub(crate) fn from_byte(b: u8, path: &Path) -> Result<Self> {
        match b {
            1 => Ok(ByteOrder::Little),
            2 => Ok(ByteOrder::Big),
            _ => Err(Error::UnsupportedClass(path.to_path_buf())),
        }
    }

    pub(crate) fn read_u16(self, buf: &[u8]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes(buf.try_into().unwrap()),
            ByteOrder::Big => u16::from_be_bytes(buf.try_into().unwrap()),
        }
    }

    pub(crate) fn read_u32(self, buf: &[u8]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(buf.try_into().unwrap()),
            ByteOrder::Big => u32::from_be_bytes(buf.try_into().unwrap()),
        }
    }

    pub(crate) fn read_u64(self, buf: &[u8]) -> u64 {
        match self {
            ByteOrder::Little => u64::from_le_bytes(buf.try_into().unwrap()),
            ByteOrder::Big => u64::from_be_bytes(buf.try_into().unwrap()),
        }
    }

    /// Read a word whose width depends on `class`: 4 bytes for `Elf32`, 8 for `Elf64`.
    pub(crate) fn read_word(self, buf: &[u8], class: Class) -> u64 {
        match class {
            Class::Elf32 => self.read_u32(buf) as u64,
            Class::Elf64 => self.read_u64(buf),
        }
    }
}
