//! ELF dependency resolution for `rootcraft`: parses just enough of an ELF
//! file (program headers and the dynamic section) to walk its `DT_NEEDED`
//! closure the way a dynamic linker would, against a host filesystem rather
//! than the running process's own address space.

pub mod cache;
mod class;
pub mod concurrent;
mod dynamic;
pub mod elf_file;
pub mod error;
pub mod ldconf;
mod header;
mod program_header;
pub mod resolver;
pub mod search;

pub use class::ByteOrder;
pub use class::Class;
pub use elf_file::DynamicInfo;
pub use elf_file::ElfFile;
pub use error::Error;
pub use error::Result;
pub use resolver::Resolver;
