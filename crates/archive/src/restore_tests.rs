// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::ingest::archive_directory;
use crate::store::hash_file;
use tempfile::tempdir;

fn fixture() -> (tempfile::TempDir, BlobStore, SnapshotManifest) {
    let store_dir = tempdir().unwrap();
    let store = BlobStore::open(store_dir.path()).unwrap();

    let src = tempdir().unwrap();
    std::fs::create_dir_all(src.path().join("nested")).unwrap();
    std::fs::write(src.path().join("a.txt"), b"alpha").unwrap();
    std::fs::write(src.path().join("nested/b.txt"), b"beta").unwrap();
    let manifest = archive_directory(&store, src.path()).unwrap();

    (store_dir, store, manifest)
}

#[test]
fn restore_round_trips_digests() {
    let (_guard, store, manifest) = fixture();
    let target = tempdir().unwrap();

    let restored =
        restore_manifest(&store, &manifest, target.path(), &RestoreOptions::default()).unwrap();
    assert_eq!(restored, 2);

    for entry in &manifest.entries {
        let path = target.path().join(&entry.path);
        assert_eq!(hash_file(&path).unwrap(), entry.sha256);
    }
}

#[test]
fn restore_refuses_overwrite_without_force() {
    let (_guard, store, manifest) = fixture();
    let target = tempdir().unwrap();
    std::fs::write(target.path().join("a.txt"), b"preexisting").unwrap();

    let result = restore_manifest(&store, &manifest, target.path(), &RestoreOptions::default());
    assert!(matches!(result, Err(ArchiveError::WouldOverwrite(_))));
    // Refusal happens before any writes
    assert!(!target.path().join("nested").exists());
    assert_eq!(std::fs::read(target.path().join("a.txt")).unwrap(), b"preexisting");
}

#[test]
fn restore_with_force_overwrites() {
    let (_guard, store, manifest) = fixture();
    let target = tempdir().unwrap();
    std::fs::write(target.path().join("a.txt"), b"stale").unwrap();

    restore_manifest(&store, &manifest, target.path(), &RestoreOptions { force: true })
        .unwrap();
    assert_eq!(std::fs::read(target.path().join("a.txt")).unwrap(), b"alpha");
}

#[cfg(unix)]
#[test]
fn restore_applies_mode_bits() {
    use std::os::unix::fs::PermissionsExt as _;

    let store_dir = tempdir().unwrap();
    let store = BlobStore::open(store_dir.path()).unwrap();
    let src = tempdir().unwrap();
    let script = src.path().join("run.sh");
    std::fs::write(&script, b"#!/bin/sh\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    let manifest = archive_directory(&store, src.path()).unwrap();

    let target = tempdir().unwrap();
    restore_manifest(&store, &manifest, target.path(), &RestoreOptions::default()).unwrap();

    let mode = std::fs::metadata(target.path().join("run.sh"))
        .unwrap()
        .permissions()
        .mode()
        & 0o7777;
    assert_eq!(mode, 0o755);
}
