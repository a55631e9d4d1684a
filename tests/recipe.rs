//! End-to-end recipe scenarios: a minimal directory tree materialized
//! through `Recipe` and read back out of the entry table.

use std::fs;

use rootcraft::Recipe;
use rootcraft::Settings;

fn run(rootfs: &std::path::Path, text: &str) -> Vec<rootcraft::Entry> {
    let mut settings = Settings::default();
    settings.rootfs = rootfs.to_path_buf();
    let mut recipe = Recipe::new(settings, None);
    recipe.parse(text).unwrap();
    recipe.into_table().unwrap().into_entries()
}

#[test]
fn minimal_directory_and_file_entries() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("busybox"), b"binary").unwrap();
    let entries = run(
        dir.path(),
        "d / 0755 0 0\nd /bin 0755 0 0\nf /busybox /bin/busybox 0755 0 0\n",
    );
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[2].dst, "bin/busybox");
    assert_eq!(entries[2].mode, 0o755);
}

#[test]
fn mask_replace_renames_destination() {
    let dir = tempfile::tempdir().unwrap();
    let entries = run(&dir.path(), "mr - ^usr/ \nd /usr/bin 0755 0 0\n");
    assert_eq!(entries[0].dst, "bin");
}

#[test]
fn heredoc_create_writes_inline_data() {
    let dir = tempfile::tempdir().unwrap();
    let entries = run(dir.path(), "c /etc/hostname 0644 0 0 <<EOF\nbox\nEOF\n");
    assert_eq!(entries[0].data, b"box\n");
}

#[test]
fn base64_entry_keeps_raw_text_until_write_time() {
    // The resolved Entry retains the literal base64 text; decoding is the
    // archive writer's job, not the table's (spec scenario: `b64` entry has
    // `data = "SGVsbG8="`, not the decoded bytes).
    let dir = tempfile::tempdir().unwrap();
    let entries = run(dir.path(), "b64 /greeting 0644 0 0 SGVsbG8=\n");
    assert_eq!(entries[0].kind, rootcraft::Kind::Base64);
    assert_eq!(entries[0].data, b"SGVsbG8=");
}

#[test]
fn brace_alternation_fans_out_destinations() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("sh"), b"x").unwrap();
    let entries = run(dir.path(), "l busybox /bin/{sh,bash} 0777 0 0\n");
    let dsts: Vec<_> = entries.iter().map(|e| e.dst.as_str()).collect();
    assert_eq!(dsts, vec!["bin/sh", "bin/bash"]);
}

#[test]
fn failable_entry_with_missing_source_is_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.rootfs = dir.path().to_path_buf();
    let mut recipe = Recipe::new(settings, None);
    recipe.parse("?a /nope /dst 0644 0 0\n").unwrap();
    assert!(recipe.into_table().unwrap().is_empty());
}

#[test]
fn replacement_preserves_original_insertion_order() {
    let dir = tempfile::tempdir().unwrap();
    let entries = run(
        dir.path(),
        "d /a 0755 0 0\nd /b 0755 0 0\nd /a 0700 0 0\n",
    );
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].dst, "a");
    assert_eq!(entries[0].mode, 0o700);
    assert_eq!(entries[1].dst, "b");
}

#[test]
fn linked_entry_materializes_intermediate_symlink_hops() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("real_lib"), b"bytes").unwrap();
    std::os::unix::fs::symlink("real_lib", dir.path().join("liblink.so")).unwrap();
    let entries = run(dir.path(), "L liblink.so bin/app 0 0\n");
    let by_dst: std::collections::HashMap<_, _> = entries.iter().map(|e| (e.dst.as_str(), e)).collect();
    assert_eq!(by_dst["liblink.so"].kind, rootcraft::Kind::Symlink);
    assert_eq!(by_dst["liblink.so"].src, "real_lib");
    assert_eq!(by_dst["bin/app"].kind, rootcraft::Kind::Regular);
}

#[test]
fn invalid_line_is_a_hard_error_when_not_failable() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.rootfs = dir.path().to_path_buf();
    let mut recipe = Recipe::new(settings, None);
    let err = recipe.parse("zz not a real entry type\n");
    assert!(err.is_err());
}
