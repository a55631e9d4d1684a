//! Tar [`Sink`] backed by the `tar` crate (USTAR/PAX). Callers are expected
//! to pass directory names with a trailing `/` already appended (the archive
//! writer façade does this for every [`Sink`] impl uniformly); this sink
//! writes whatever name it's given.

use std::io::Write;

use crate::archive::FileType;
use crate::archive::Header;
use crate::archive::Sink;
use crate::Error;
use crate::Result;

/// Writes entries as a tar stream to any `io::Write`, deterministically:
/// no PAX extension records are emitted unless a name or link target
/// genuinely needs one, so two runs over the same recipe produce
/// byte-identical output.
pub struct TarSink<W: Write> {
    builder: tar::Builder<W>,
}

impl<W: Write> TarSink<W> {
    /// Wrap `writer` in a fresh tar stream.
    pub fn new(writer: W) -> Self {
        let mut builder = tar::Builder::new(writer);
        builder.mode(tar::HeaderMode::Complete);
        TarSink { builder }
    }

    fn base_header(header: &Header) -> Result<tar::Header> {
        let mut h = tar::Header::new_ustar();
        h.set_path(&header.name).map_err(Error::Io)?;
        h.set_mode(header.mode);
        h.set_uid(header.uid as u64);
        h.set_gid(header.gid as u64);
        h.set_mtime(header.mtime.max(0) as u64);
        Ok(h)
    }
}

impl<W: Write> Sink for TarSink<W> {
    fn write_header(&mut self, header: &Header) -> Result<()> {
        match header.file_type {
            FileType::Directory => {
                let mut h = Self::base_header(header)?;
                h.set_entry_type(tar::EntryType::Directory);
                h.set_size(0);
                h.set_cksum();
                self.builder.append(&h, std::io::empty())?;
            }
            FileType::Symlink => {
                let mut h = Self::base_header(header)?;
                h.set_entry_type(tar::EntryType::Symlink);
                h.set_size(0);
                self.builder
                    .append_link(&mut h, &header.name, &header.link_target)
                    .map_err(Error::Io)?;
            }
            FileType::Regular => {
                return Err(Error::invalid_line(0, "write_header called for a regular file"));
            }
        }
        Ok(())
    }

    fn write_file(&mut self, header: &Header, body: &[u8]) -> Result<()> {
        let mut h = Self::base_header(header)?;
        h.set_entry_type(tar::EntryType::Regular);
        h.set_size(body.len() as u64);
        h.set_cksum();
        self.builder.append(&h, body).map_err(Error::Io)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.builder.finish().map_err(Error::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_a_directory_file_and_symlink() {
        let mut buf = Vec::new();
        {
            let mut sink = TarSink::new(&mut buf);
            sink.write_header(&Header {
                name: "bin/".to_string(),
                size: 0,
                mode: 0o755,
                uid: 0,
                gid: 0,
                mtime: 0,
                file_type: FileType::Directory,
                link_target: String::new(),
            })
            .unwrap();
            sink.write_file(
                &Header {
                    name: "bin/hello".to_string(),
                    size: 5,
                    mode: 0o644,
                    uid: 0,
                    gid: 0,
                    mtime: 0,
                    file_type: FileType::Regular,
                    link_target: String::new(),
                },
                b"hello",
            )
            .unwrap();
            sink.write_header(&Header {
                name: "bin/link".to_string(),
                size: 0,
                mode: 0o777,
                uid: 0,
                gid: 0,
                mtime: 0,
                file_type: FileType::Symlink,
                link_target: "hello".to_string(),
            })
            .unwrap();
            sink.close().unwrap();
        }
        assert!(!buf.is_empty());
        let mut archive = tar::Archive::new(buf.as_slice());
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["bin/", "bin/hello", "bin/link"]);
    }
}
