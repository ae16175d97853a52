// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

// SHA-256 of "hello world"
const HELLO_DIGEST: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

#[test]
fn put_bytes_lands_at_sharded_path() {
    let dir = tempdir().unwrap();
    let store = BlobStore::open(dir.path()).unwrap();

    let (digest, size) = store.put_bytes(b"hello world").unwrap();
    assert_eq!(digest.as_str(), HELLO_DIGEST);
    assert_eq!(size, 11);

    let expected = dir
        .path()
        .join("sha256")
        .join(&HELLO_DIGEST[..2])
        .join(&HELLO_DIGEST[2..4])
        .join(&HELLO_DIGEST[4..]);
    assert!(expected.is_file());
    assert_eq!(std::fs::read(expected).unwrap(), b"hello world");
}

#[test]
fn put_file_matches_put_bytes() {
    let dir = tempdir().unwrap();
    let store = BlobStore::open(dir.path()).unwrap();
    let source = dir.path().join("input.bin");
    std::fs::write(&source, b"hello world").unwrap();

    let (digest, size) = store.put(&source).unwrap();
    assert_eq!(digest.as_str(), HELLO_DIGEST);
    assert_eq!(size, 11);
    assert!(store.has(&digest));
}

#[test]
fn repeated_put_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = BlobStore::open(dir.path()).unwrap();

    let (a, _) = store.put_bytes(b"same bytes").unwrap();
    let (b, _) = store.put_bytes(b"same bytes").unwrap();
    assert_eq!(a, b);

    let stats = store.stats().unwrap();
    assert_eq!(stats.blobs, 1);
}

#[test]
fn open_blob_reads_back() {
    let dir = tempdir().unwrap();
    let store = BlobStore::open(dir.path()).unwrap();
    let (digest, _) = store.put_bytes(b"payload").unwrap();

    let mut content = Vec::new();
    use std::io::Read as _;
    store.open_blob(&digest).unwrap().read_to_end(&mut content).unwrap();
    assert_eq!(content, b"payload");
}

#[test]
fn open_missing_blob_is_not_found() {
    let dir = tempdir().unwrap();
    let store = BlobStore::open(dir.path()).unwrap();
    let digest = Digest::parse(HELLO_DIGEST).unwrap();
    assert!(matches!(
        store.open_blob(&digest),
        Err(ArchiveError::BlobNotFound(_))
    ));
}

#[test]
fn link_or_copy_materializes_identical_bytes() {
    let dir = tempdir().unwrap();
    let store = BlobStore::open(dir.path()).unwrap();
    let (digest, _) = store.put_bytes(b"shared content").unwrap();

    let dest = dir.path().join("out").join("copy.bin");
    store.link_or_copy(&digest, &dest).unwrap();
    assert_eq!(std::fs::read(&dest).unwrap(), b"shared content");
}

#[test]
fn gc_deletes_only_orphans() {
    let dir = tempdir().unwrap();
    let store = BlobStore::open(dir.path()).unwrap();
    let (live, _) = store.put_bytes(b"live").unwrap();
    let (orphan, _) = store.put_bytes(b"orphan").unwrap();

    let mut live_set = HashSet::new();
    live_set.insert(live.clone());

    let report = store.gc(&live_set).unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.deleted, 1);
    assert!(store.has(&live));
    assert!(!store.has(&orphan));
}

#[test]
fn verify_quarantines_corrupt_blob() {
    let dir = tempdir().unwrap();
    let store = BlobStore::open(dir.path()).unwrap();
    let (digest, _) = store.put_bytes(b"original").unwrap();

    // Corrupt the blob in place
    std::fs::write(store.blob_path(&digest), b"tampered").unwrap();

    assert!(matches!(
        store.verify(&digest),
        Err(ArchiveError::CorruptBlob { .. })
    ));
    assert!(!store.has(&digest));
    assert!(dir.path().join("quarantine").join(digest.as_str()).is_file());
}

#[test]
fn verify_passes_intact_blob() {
    let dir = tempdir().unwrap();
    let store = BlobStore::open(dir.path()).unwrap();
    let (digest, _) = store.put_bytes(b"intact").unwrap();
    store.verify(&digest).unwrap();
    assert!(store.has(&digest));
}

#[test]
fn open_sweeps_leftover_temp_files() {
    let dir = tempdir().unwrap();
    {
        let _ = BlobStore::open(dir.path()).unwrap();
    }
    let stale = dir.path().join("tmp").join("put-999-0.tmp");
    std::fs::write(&stale, b"partial").unwrap();

    let _ = BlobStore::open(dir.path()).unwrap();
    assert!(!stale.exists());
}

#[test]
fn digest_parse_rejects_bad_input() {
    assert!(Digest::parse("").is_err());
    assert!(Digest::parse("zz").is_err());
    assert!(Digest::parse(&"A".repeat(64)).is_err()); // uppercase
    assert!(Digest::parse(&"a".repeat(63)).is_err());
    assert!(Digest::parse(&"a".repeat(64)).is_ok());
}
