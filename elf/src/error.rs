use std::path::PathBuf;

/// Errors produced while parsing or resolving an ELF file.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// File doesn't start with the ELF magic number.
    #[error("not an ELF file: {0:?}")]
    NotElf(PathBuf),
    /// `EI_CLASS` byte wasn't `ELFCLASS32` or `ELFCLASS64`.
    #[error("unsupported ELF class in {0:?}")]
    UnsupportedClass(PathBuf),
    /// File ended before a header or table we expected to read.
    #[error("truncated ELF file: {0:?}")]
    Truncated(PathBuf),
    /// A string table offset pointed past the end of its section.
    #[error("malformed string table in {0:?}")]
    BadStringTable(PathBuf),
    /// Input/output error.
    #[error("input/output error: {0}")]
    Io(#[from] std::io::Error),
    /// `ld.so.conf` or a musl library path file was malformed.
    #[error("malformed linker configuration {0:?}: {1}")]
    BadLdConfig(PathBuf, String),
    /// A glob pattern in `ld.so.conf`'s `include` directive failed to compile.
    #[error("invalid glob pattern: {0}")]
    BadGlob(#[from] glob::PatternError),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
