//! Dependency resolution against hand-built, minimal ELF64 fixtures: just
//! enough of a real file header, one `PT_LOAD`, one `PT_DYNAMIC`, and a
//! string table to exercise the `DT_NEEDED` walk without needing a real
//! system binary on disk.

use std::fs;
use std::path::Path;

use rootcraft::ElfResolveOptions;
use rootcraft::ElfResolver;
use rootcraft::Libc;
use rootcraft_elf::concurrent;
use rootcraft_elf::resolver::Resolver;

fn le64(v: u64) -> [u8; 8] {
    v.to_le_bytes()
}
fn le32(v: u32) -> [u8; 4] {
    v.to_le_bytes()
}
fn le16(v: u16) -> [u8; 2] {
    v.to_le_bytes()
}

/// Build a minimal dynamically-linked ELF64 file whose only `DT_NEEDED`
/// entry is `needed`, identity-mapped (file offset == vaddr) so the dynamic
/// table's `DT_STRTAB` vaddr resolves trivially through its single `PT_LOAD`.
fn build_minimal_elf(needed: &str) -> Vec<u8> {
    const PHOFF: u64 = 64;
    const PHENTSIZE: u16 = 56;
    const DYN_OFFSET: u64 = 176;
    const DYN_ENTRIES: u64 = 3;
    const DYN_SIZE: u64 = DYN_ENTRIES * 16;
    let strtab_off = DYN_OFFSET + DYN_SIZE;

    let mut strtab = vec![0u8]; // index 0: empty string
    let needed_rel = strtab.len() as u64;
    strtab.extend_from_slice(needed.as_bytes());
    strtab.push(0);

    let total_len = strtab_off + strtab.len() as u64;

    let mut buf = Vec::new();
    // e_ident
    buf.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    buf.extend_from_slice(&le16(2)); // e_type = ET_EXEC
    buf.extend_from_slice(&le16(0x3e)); // e_machine = x86_64
    buf.extend_from_slice(&le32(1)); // e_version
    buf.extend_from_slice(&le64(0)); // e_entry
    buf.extend_from_slice(&le64(PHOFF)); // e_phoff
    buf.extend_from_slice(&le64(0)); // e_shoff
    buf.extend_from_slice(&le32(0)); // e_flags
    buf.extend_from_slice(&le16(64)); // e_ehsize
    buf.extend_from_slice(&le16(PHENTSIZE)); // e_phentsize
    buf.extend_from_slice(&le16(2)); // e_phnum
    buf.extend_from_slice(&le16(0)); // e_shentsize
    buf.extend_from_slice(&le16(0)); // e_shnum
    buf.extend_from_slice(&le16(0)); // e_shstrndx
    assert_eq!(buf.len(), 64);

    // PT_LOAD covering the whole file, identity-mapped.
    buf.extend_from_slice(&le32(1)); // p_type
    buf.extend_from_slice(&le32(5)); // p_flags
    buf.extend_from_slice(&le64(0)); // p_offset
    buf.extend_from_slice(&le64(0)); // p_vaddr
    buf.extend_from_slice(&le64(0)); // p_paddr
    buf.extend_from_slice(&le64(total_len)); // p_filesz
    buf.extend_from_slice(&le64(total_len)); // p_memsz
    buf.extend_from_slice(&le64(0x1000)); // p_align
    assert_eq!(buf.len() as u64, PHOFF + PHENTSIZE as u64);

    // PT_DYNAMIC
    buf.extend_from_slice(&le32(2)); // p_type
    buf.extend_from_slice(&le32(6)); // p_flags
    buf.extend_from_slice(&le64(DYN_OFFSET)); // p_offset
    buf.extend_from_slice(&le64(DYN_OFFSET)); // p_vaddr
    buf.extend_from_slice(&le64(DYN_OFFSET)); // p_paddr
    buf.extend_from_slice(&le64(DYN_SIZE)); // p_filesz
    buf.extend_from_slice(&le64(DYN_SIZE)); // p_memsz
    buf.extend_from_slice(&le64(8)); // p_align
    assert_eq!(buf.len() as u64, DYN_OFFSET);

    // Dynamic table: DT_NEEDED, DT_STRTAB, DT_NULL.
    buf.extend_from_slice(&le64(1)); // DT_NEEDED
    buf.extend_from_slice(&le64(needed_rel));
    buf.extend_from_slice(&le64(5)); // DT_STRTAB
    buf.extend_from_slice(&le64(strtab_off));
    buf.extend_from_slice(&le64(0)); // DT_NULL
    buf.extend_from_slice(&le64(0));
    assert_eq!(buf.len() as u64, strtab_off);

    buf.extend_from_slice(&strtab);
    assert_eq!(buf.len() as u64, total_len);
    buf
}

fn write_elf(path: &Path, needed: &str) {
    fs::write(path, build_minimal_elf(needed)).unwrap();
}

#[test]
fn resolves_a_single_needed_library_from_a_search_dir() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("lib")).unwrap();
    write_elf(&dir.path().join("lib/libneeded.so"), "libc.so.6");
    write_elf(&dir.path().join("bin_target"), "libneeded.so");

    let resolver = Resolver::new(Libc::Glibc);
    let options = ElfResolveOptions {
        rootfs: dir.path().to_path_buf(),
        extra_search_dirs: vec![dir.path().join("lib").to_string_lossy().into_owned()],
        ld_so_conf: None,
        resolve_once: true,
    };
    let result = resolver.resolve(&dir.path().join("bin_target"), &options).unwrap();
    assert!(result.is_dynamic);
    assert_eq!(result.dependencies.len(), 1);
    assert_eq!(result.dependencies[0].needed_name, "libneeded.so");
}

#[test]
fn libc_terminates_the_walk_without_recursing_into_it() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("lib")).unwrap();
    // libc.so.6 itself "needs" a library that doesn't exist; if the walk
    // recursed into it, resolution would fail.
    write_elf(&dir.path().join("lib/libc.so.6"), "nonexistent.so");
    write_elf(&dir.path().join("bin_target"), "libc.so.6");

    let resolver = Resolver::new(Libc::Glibc);
    let options = ElfResolveOptions {
        rootfs: dir.path().to_path_buf(),
        extra_search_dirs: vec![dir.path().join("lib").to_string_lossy().into_owned()],
        ld_so_conf: None,
        resolve_once: true,
    };
    let result = resolver.resolve(&dir.path().join("bin_target"), &options).unwrap();
    assert_eq!(result.dependencies.len(), 1);
}

#[test]
fn missing_dependency_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    write_elf(&dir.path().join("bin_target"), "libghost.so");

    let resolver = Resolver::new(Libc::Glibc);
    let options = ElfResolveOptions {
        rootfs: dir.path().to_path_buf(),
        extra_search_dirs: vec![],
        ld_so_conf: None,
        resolve_once: true,
    };
    assert!(resolver.resolve(&dir.path().join("bin_target"), &options).is_err());
}

#[test]
fn resolve_all_runs_jobs_on_a_bounded_pool_and_keeps_request_order() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("lib")).unwrap();
    write_elf(&dir.path().join("lib/libneeded.so"), "libc.so.6");
    write_elf(&dir.path().join("bin_a"), "libneeded.so");
    write_elf(&dir.path().join("bin_b"), "libneeded.so");

    let resolver = Resolver::new(Libc::Glibc);
    let options = ElfResolveOptions {
        rootfs: dir.path().to_path_buf(),
        extra_search_dirs: vec![dir.path().join("lib").to_string_lossy().into_owned()],
        ld_so_conf: None,
        resolve_once: true,
    };
    let jobs = vec![
        concurrent::Job { line: 1, target: dir.path().join("bin_a") },
        concurrent::Job { line: 2, target: dir.path().join("bin_b") },
    ];
    let results = concurrent::resolve_all(&resolver, &options, jobs, 2);

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].line, 1);
    assert_eq!(results[0].target, dir.path().join("bin_a"));
    assert_eq!(results[1].line, 2);
    assert_eq!(results[1].target, dir.path().join("bin_b"));
    for r in &results {
        let resolved = r.result.as_ref().unwrap();
        assert!(resolved.is_dynamic);
        assert_eq!(resolved.dependencies.len(), 1);
    }
}
