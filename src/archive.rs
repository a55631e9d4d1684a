//! Archive writer façade: a format-agnostic [`Sink`] trait, implemented by
//! [`crate::tar::TarSink`] and [`crate::cpio::CpioSink`].

use crate::Result;

/// Archival object kind as seen by a [`Sink`], independent of recipe-level
/// [`crate::entry::Kind`] distinctions that don't matter on the wire
/// (`Create`/`CreateNoEndl`/`Base64` are all just `Regular` once their data
/// is resolved).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// A regular file; body bytes follow via [`Sink::write`].
    Regular,
    /// A directory; no body.
    Directory,
    /// A symlink; the target is carried in [`Header::link_target`].
    Symlink,
}

/// Per-entry metadata handed to a [`Sink`] ahead of any body bytes.
#[derive(Debug, Clone)]
pub struct Header {
    /// Archive path, no leading `/`.
    pub name: String,
    /// Body size in bytes. Ignored for directories and symlinks.
    pub size: u64,
    /// POSIX mode bits.
    pub mode: u32,
    /// Numeric owner uid.
    pub uid: i64,
    /// Numeric owner gid.
    pub gid: i64,
    /// Seconds since epoch.
    pub mtime: i64,
    /// Entry kind.
    pub file_type: FileType,
    /// Symlink target, set only when `file_type == Symlink`.
    pub link_target: String,
}

/// A destination archive format. Entries are written header-then-body, in
/// the order the caller supplies them (the entry table's insertion order);
/// `close` finalizes any format-specific trailer and flushes the sink.
pub trait Sink {
    /// Write `header` for a directory or symlink entry (no following body).
    fn write_header(&mut self, header: &Header) -> Result<()>;

    /// Write `header` for a regular file, followed immediately by its full
    /// body in one call. Implementations that need alignment padding
    /// (cpio) or exact-size trailers (tar) do so internally.
    fn write_file(&mut self, header: &Header, body: &[u8]) -> Result<()>;

    /// Finalize the archive: trailer record, final padding, flush.
    fn close(&mut self) -> Result<()>;
}
