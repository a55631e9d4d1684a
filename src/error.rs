use std::path::PathBuf;

/// Errors produced while parsing a recipe or materializing its entries.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A recipe line could not be parsed or referred to undefined state.
    #[error("{message}, line {line}")]
    InvalidLine {
        /// 1-based source line number.
        line: usize,
        /// Human-readable description of what was wrong.
        message: String,
    },
    /// A mask directive referenced an index that doesn't exist.
    #[error("undefined mask index: {0}")]
    UndefinedMask(i64),
    /// A mask or glob regular expression failed to compile.
    #[error("invalid regular expression: {0}")]
    BadRegex(#[from] regex::Error),
    /// A required source path was not found and the entry was not failable.
    #[error("not found: {0:?}")]
    NotFound(PathBuf),
    /// Symlink chasing exceeded the traversal cap.
    #[error("too many levels of symbolic links: {0:?}")]
    TooManyLinks(PathBuf),
    /// Input/output error.
    #[error("input/output error: {0}")]
    Io(#[from] std::io::Error),
    /// ELF resolution failed. Boxed so this crate need not depend on the
    /// concrete ELF error type; `rootcraft-elf` implements `ElfResolver`
    /// and reports its errors through this variant.
    #[error("ELF dependency resolution failed: {0}")]
    Elf(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Several concurrent ELF resolutions failed; each is tagged with the
    /// recipe line number of the entry that triggered it.
    #[error("{} concurrent resolution error(s)", .0.len())]
    Multi(Vec<(usize, Error)>),
}

impl Error {
    /// Build an [`Error::InvalidLine`] from a line number and message.
    pub fn invalid_line(line: usize, message: impl Into<String>) -> Self {
        Error::InvalidLine {
            line,
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
