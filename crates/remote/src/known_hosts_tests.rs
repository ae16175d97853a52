// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use base64::Engine as _;
use tempfile::tempdir;

fn record(host: &str, port: u16, key: &[u8]) -> HostKeyRecord {
    HostKeyRecord {
        host: host.to_string(),
        port,
        key_type: "ssh-ed25519".to_string(),
        key_base64: base64::engine::general_purpose::STANDARD.encode(key),
    }
}

#[test]
fn missing_file_means_every_host_is_unknown() {
    let dir = tempdir().unwrap();
    let kh = KnownHosts::new(&dir.path().join("known_hosts"));
    assert_eq!(
        kh.check("example.com", 22, "ssh-ed25519", b"key").unwrap(),
        HostKeyCheck::Unknown
    );
}

#[test]
fn accept_then_check_matches() {
    let dir = tempdir().unwrap();
    let kh = KnownHosts::new(&dir.path().join("known_hosts"));
    kh.accept(&record("example.com", 22, b"key-bytes")).unwrap();

    assert_eq!(
        kh.check("example.com", 22, "ssh-ed25519", b"key-bytes").unwrap(),
        HostKeyCheck::Match
    );
}

#[test]
fn changed_key_is_a_mismatch_with_the_stored_record() {
    let dir = tempdir().unwrap();
    let kh = KnownHosts::new(&dir.path().join("known_hosts"));
    let stored = record("example.com", 22, b"old-key");
    kh.accept(&stored).unwrap();

    match kh.check("example.com", 22, "ssh-ed25519", b"new-key").unwrap() {
        HostKeyCheck::Mismatch(previous) => assert_eq!(previous, stored),
        other => panic!("expected mismatch, got {:?}", other),
    }
}

#[test]
fn ports_are_distinct_hosts() {
    let dir = tempdir().unwrap();
    let kh = KnownHosts::new(&dir.path().join("known_hosts"));
    kh.accept(&record("example.com", 22, b"key-a")).unwrap();

    assert_eq!(
        kh.check("example.com", 2222, "ssh-ed25519", b"key-a").unwrap(),
        HostKeyCheck::Unknown
    );
}

#[test]
fn non_default_port_round_trips_bracket_spec() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("known_hosts");
    let kh = KnownHosts::new(&path);
    kh.accept(&record("example.com", 2222, b"key-a")).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("[example.com]:2222 ssh-ed25519 "));

    assert_eq!(
        kh.check("example.com", 2222, "ssh-ed25519", b"key-a").unwrap(),
        HostKeyCheck::Match
    );
}

#[test]
fn accept_replaces_previous_entry_for_same_host() {
    let dir = tempdir().unwrap();
    let kh = KnownHosts::new(&dir.path().join("known_hosts"));
    kh.accept(&record("example.com", 22, b"old-key")).unwrap();
    kh.accept(&record("example.com", 22, b"new-key")).unwrap();

    assert_eq!(kh.records().unwrap().len(), 1);
    assert_eq!(
        kh.check("example.com", 22, "ssh-ed25519", b"new-key").unwrap(),
        HostKeyCheck::Match
    );
}

#[test]
fn malformed_lines_are_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("known_hosts");
    std::fs::write(
        &path,
        "# comment\n\nonly-two fields\nexample.com ssh-ed25519 QUJD\n",
    )
    .unwrap();

    let kh = KnownHosts::new(&path);
    let records = kh.records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].host, "example.com");
}

#[test]
fn fingerprint_matches_openssh_shape() {
    let fp = fingerprint_sha256(b"some key blob");
    assert!(fp.starts_with("SHA256:"));
    // Unpadded base64 of 32 bytes is 43 chars
    assert_eq!(fp.len(), "SHA256:".len() + 43);
    assert!(!fp.ends_with('='));
}

#[cfg(unix)]
#[test]
fn file_is_created_private() {
    use std::os::unix::fs::PermissionsExt as _;
    let dir = tempdir().unwrap();
    let path = dir.path().join("known_hosts");
    KnownHosts::new(&path).accept(&record("h", 22, b"k")).unwrap();
    let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}
