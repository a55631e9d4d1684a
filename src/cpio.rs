//! cpio "new ASCII" (`070701`) [`Sink`], hand-rolled from the format's byte
//! layout: no crate in the surrounding ecosystem offers a writer for it, so
//! this follows the on-disk layout directly rather than going through a
//! dependency.

use std::io::Write;

use crate::archive::FileType;
use crate::archive::Header;
use crate::archive::Sink;
use crate::Result;

const MAGIC: &str = "070701";
const TRAILER_NAME: &str = "TRAILER!!!";

fn hex8(n: u64) -> String {
    format!("{n:08x}")
}

fn pad_to_4(len: usize) -> usize {
    (4 - (len % 4)) % 4
}

/// Writes entries as a new-ASCII-format cpio stream (the format `rootcraft`
/// uses for initramfs-style archives). Inode numbers increment per entry so
/// hardlink detection downstream (e.g. the kernel's initramfs unpacker)
/// never sees two entries alias the same inode.
pub struct CpioSink<W: Write> {
    writer: W,
    next_ino: u64,
    closed: bool,
}

impl<W: Write> CpioSink<W> {
    /// Wrap `writer` in a fresh cpio stream.
    pub fn new(writer: W) -> Self {
        CpioSink {
            writer,
            next_ino: 1,
            closed: false,
        }
    }

    fn write_record(&mut self, name: &str, mode: u32, uid: i64, gid: i64, mtime: i64, body: &[u8]) -> Result<()> {
        let ino = self.next_ino;
        self.next_ino += 1;
        let namesize = name.len() + 1; // includes trailing NUL
        // Directories get nlink=2 (the conventional "." self-reference);
        // every other type, including the trailer record, is 1.
        let nlink = if mode & 0o170000 == 0o040000 { 2 } else { 1 };
        let mut record = String::with_capacity(110);
        record.push_str(MAGIC);
        record.push_str(&hex8(ino));
        record.push_str(&hex8(mode as u64));
        record.push_str(&hex8(uid.max(0) as u64));
        record.push_str(&hex8(gid.max(0) as u64));
        record.push_str(&hex8(nlink)); // c_nlink
        record.push_str(&hex8(mtime.max(0) as u64));
        record.push_str(&hex8(body.len() as u64));
        record.push_str(&hex8(0)); // c_devmajor
        record.push_str(&hex8(0)); // c_devminor
        record.push_str(&hex8(0)); // c_rdevmajor
        record.push_str(&hex8(0)); // c_rdevminor
        record.push_str(&hex8(namesize as u64));
        record.push_str(&hex8(0)); // c_check

        self.writer.write_all(record.as_bytes())?;
        self.writer.write_all(name.as_bytes())?;
        self.writer.write_all(&[0u8])?;
        let header_and_name = 110 + namesize;
        self.writer.write_all(&vec![0u8; pad_to_4(header_and_name)])?;

        if !body.is_empty() {
            self.writer.write_all(body)?;
        }
        self.writer.write_all(&vec![0u8; pad_to_4(body.len())])?;
        Ok(())
    }
}

impl<W: Write> Sink for CpioSink<W> {
    fn write_header(&mut self, header: &Header) -> Result<()> {
        match header.file_type {
            FileType::Directory => {
                self.write_record(&header.name, 0o040000 | (header.mode & 0o7777), header.uid, header.gid, header.mtime, &[])
            }
            FileType::Symlink => {
                let target = header.link_target.as_bytes();
                self.write_record(
                    &header.name,
                    0o120000 | (header.mode & 0o7777),
                    header.uid,
                    header.gid,
                    header.mtime,
                    target,
                )
            }
            FileType::Regular => Err(crate::Error::invalid_line(0, "write_header called for a regular file")),
        }
    }

    fn write_file(&mut self, header: &Header, body: &[u8]) -> Result<()> {
        self.write_record(&header.name, 0o100000 | (header.mode & 0o7777), header.uid, header.gid, header.mtime, body)
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.write_record(TRAILER_NAME, 0, 0, 0, 0, &[])?;
            self.closed = true;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_header(bytes: &[u8]) -> (u32, u64, usize, usize) {
        let s = std::str::from_utf8(&bytes[..110]).unwrap();
        assert_eq!(&s[0..6], MAGIC);
        let field = |i: usize| u32::from_str_radix(&s[6 + i * 8..14 + i * 8], 16).unwrap();
        let mode = field(1);
        let filesize = field(6) as u64;
        let namesize = field(11) as usize;
        (mode, filesize, namesize, 110)
    }

    #[test]
    fn regular_file_round_trips_header_fields() {
        let mut buf = Vec::new();
        {
            let mut sink = CpioSink::new(&mut buf);
            sink.write_file(
                &Header {
                    name: "hello".to_string(),
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
            sink.close().unwrap();
        }
        let (mode, filesize, namesize, _) = parse_header(&buf);
        assert_eq!(mode, 0o100644);
        assert_eq!(filesize, 5);
        assert_eq!(namesize, "hello".len() + 1);
    }

    #[test]
    fn ends_with_trailer_record() {
        let mut buf = Vec::new();
        {
            let mut sink = CpioSink::new(&mut buf);
            sink.close().unwrap();
        }
        let name_start = 110;
        let name = std::str::from_utf8(&buf[name_start..name_start + TRAILER_NAME.len()]).unwrap();
        assert_eq!(name, TRAILER_NAME);
    }

    #[test]
    fn records_are_four_byte_aligned() {
        let mut buf = Vec::new();
        {
            let mut sink = CpioSink::new(&mut buf);
            sink.write_file(
                &Header {
                    name: "a".to_string(),
                    size: 1,
                    mode: 0o644,
                    uid: 0,
                    gid: 0,
                    mtime: 0,
                    file_type: FileType::Regular,
                    link_target: String::new(),
                },
                b"x",
            )
            .unwrap();
            sink.close().unwrap();
        }
        // first record: 110 header + 2 name bytes ("a\0") padded to 4, then 1 byte body padded to 4
        let header_and_name = 110 + 2;
        let first_record_len = header_and_name + pad_to_4(header_and_name) + 1 + pad_to_4(1);
        assert_eq!(first_record_len % 4, 0);
        assert!(buf.len() > first_record_len);
    }
}
