// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn saved_asset(digest: &str) -> AssetEntry {
    AssetEntry {
        kind: AssetKind::Dataset,
        name: Some("data".to_string()),
        description: None,
        source_uri: None,
        context: None,
        saved: true,
        digest: Some(Digest::parse(digest).unwrap()),
        size: Some(10),
        original_path: Some("data/train.csv".to_string()),
        archive_path: None,
        producing_run: None,
    }
}

fn digest_of(byte: u8) -> String {
    format!("{:02x}", byte).repeat(32)
}

#[test]
fn identity_prefers_fingerprint() {
    let mut asset = saved_asset(&digest_of(0xab));
    asset.source_uri = Some("s3://bucket/x".to_string());
    let id = asset.identity().unwrap();
    assert_eq!(id.id_type, AssetIdType::Fingerprint);
    assert_eq!(id.id_value, digest_of(0xab));
}

#[test]
fn identity_falls_back_in_order() {
    let mut asset = saved_asset(&digest_of(0xab));
    asset.digest = None;
    asset.archive_path = Some("bundle/a.zip".to_string());
    assert_eq!(asset.identity().unwrap().id_type, AssetIdType::ArchivePath);

    asset.archive_path = None;
    asset.source_uri = Some("https://example.com/w.pt".to_string());
    assert_eq!(asset.identity().unwrap().id_type, AssetIdType::SourceUri);

    asset.source_uri = None;
    assert_eq!(asset.identity().unwrap().id_type, AssetIdType::Name);

    asset.name = None;
    assert!(asset.identity().is_none());
}

#[test]
fn fingerprint_is_order_independent() {
    let a = SnapshotEntry {
        path: "src/main.rs".to_string(),
        size: 1,
        sha256: Digest::parse(&digest_of(0x01)).unwrap(),
        mode: 0o644,
    };
    let b = SnapshotEntry {
        path: "Cargo.toml".to_string(),
        size: 2,
        sha256: Digest::parse(&digest_of(0x02)).unwrap(),
        mode: 0o644,
    };

    let forward = SnapshotManifest { entries: vec![a.clone(), b.clone()] };
    let reverse = SnapshotManifest { entries: vec![b, a] };
    assert_eq!(forward.fingerprint(), reverse.fingerprint());
}

#[test]
fn fingerprint_changes_with_content() {
    let entry = |digest: &str| SnapshotEntry {
        path: "f".to_string(),
        size: 1,
        sha256: Digest::parse(digest).unwrap(),
        mode: 0o644,
    };
    let one = SnapshotManifest { entries: vec![entry(&digest_of(0x01))] };
    let two = SnapshotManifest { entries: vec![entry(&digest_of(0x02))] };
    assert_ne!(one.fingerprint(), two.fingerprint());
}

#[test]
fn scan_live_digests_includes_recycle_bin() {
    let root = tempdir().unwrap();
    let live = digest_of(0xaa);
    let recycled = digest_of(0xbb);

    let write_manifest = |dir: &std::path::Path, digest: &str| {
        std::fs::create_dir_all(dir).unwrap();
        let manifest = AssetManifest { version: 1, assets: vec![saved_asset(digest)] };
        std::fs::write(
            dir.join(ASSETS_FILE_NAME),
            serde_json::to_vec(&manifest).unwrap(),
        )
        .unwrap();
    };

    write_manifest(&root.path().join("proj/run_a"), &live);
    write_manifest(&root.path().join("recycle_bin/proj/run_b"), &recycled);

    let set = scan_live_digests(root.path()).unwrap();
    assert_eq!(set.len(), 2);
    assert!(set.contains(&Digest::parse(&live).unwrap()));
    assert!(set.contains(&Digest::parse(&recycled).unwrap()));
}

#[test]
fn scan_skips_unreferenced_and_unsaved() {
    let root = tempdir().unwrap();
    let dir = root.path().join("proj/run");
    std::fs::create_dir_all(&dir).unwrap();

    let mut referenced = saved_asset(&digest_of(0x0c));
    referenced.saved = false; // referenced-only asset keeps no blob alive
    let manifest = AssetManifest { version: 1, assets: vec![referenced] };
    std::fs::write(dir.join(ASSETS_FILE_NAME), serde_json::to_vec(&manifest).unwrap())
        .unwrap();

    assert!(scan_live_digests(root.path()).unwrap().is_empty());
}

#[test]
fn lineage_handles_cycles() {
    // a → b → a: the visited set must terminate the walk
    let assets = |run: &str| {
        let producer = match run {
            "a" => "b",
            "b" => "a",
            _ => return vec![],
        };
        let mut asset = saved_asset(&digest_of(0x0d));
        asset.producing_run = Some(producer.to_string());
        vec![asset]
    };

    let order = lineage_runs("a", assets).unwrap();
    assert_eq!(order, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn lineage_bails_on_excessive_depth() {
    // Each run points to a fresh producer, beyond the depth cap
    let assets = |run: &str| {
        let n: usize = run.parse().unwrap_or(0);
        let mut asset = saved_asset(&digest_of(0x0e));
        asset.producing_run = Some((n + 1).to_string());
        vec![asset]
    };

    assert!(matches!(
        lineage_runs("0", assets),
        Err(ArchiveError::LineageTooDeep(_))
    ));
}
