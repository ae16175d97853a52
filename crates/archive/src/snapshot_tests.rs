// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

#[test]
fn snapshots_tree_with_manifest() {
    let ws = tempdir().unwrap();
    write(&ws.path().join("train.py"), "print('hi')\n");
    write(&ws.path().join("src/model.py"), "pass\n");

    let out = tempdir().unwrap();
    let zip_path = out.path().join("snap.zip");
    let result = snapshot_workspace(ws.path(), &zip_path, &SnapshotOptions::default()).unwrap();

    let paths: Vec<&str> =
        result.manifest.entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["src/model.py", "train.py"]);
    assert!(zip_path.is_file());

    // ZIP contains both files plus the embedded manifest
    let mut archive = zip::ZipArchive::new(std::fs::File::open(&zip_path).unwrap()).unwrap();
    let names: Vec<String> =
        (0..archive.len()).map(|i| archive.by_index(i).unwrap().name().to_string()).collect();
    assert!(names.contains(&"train.py".to_string()));
    assert!(names.contains(&"src/model.py".to_string()));
    assert!(names.contains(&MANIFEST_ENTRY.to_string()));
}

#[test]
fn rnignore_excludes_matching_paths() {
    let ws = tempdir().unwrap();
    write(&ws.path().join(".rnignore"), "*.log\ncheckpoints/\n");
    write(&ws.path().join("train.py"), "x\n");
    write(&ws.path().join("debug.log"), "noise\n");
    write(&ws.path().join("checkpoints/epoch1.pt"), "weights\n");

    let out = tempdir().unwrap();
    let result = snapshot_workspace(
        ws.path(),
        &out.path().join("snap.zip"),
        &SnapshotOptions::default(),
    )
    .unwrap();

    let paths: Vec<&str> =
        result.manifest.entries.iter().map(|e| e.path.as_str()).collect();
    assert!(paths.contains(&"train.py"));
    assert!(paths.contains(&".rnignore"));
    assert!(!paths.iter().any(|p| p.ends_with(".log")));
    assert!(!paths.iter().any(|p| p.starts_with("checkpoints/")));
}

#[test]
fn git_dir_is_always_excluded() {
    let ws = tempdir().unwrap();
    write(&ws.path().join(".git/HEAD"), "ref: refs/heads/main\n");
    write(&ws.path().join("main.rs"), "fn main() {}\n");

    let out = tempdir().unwrap();
    let result = snapshot_workspace(
        ws.path(),
        &out.path().join("snap.zip"),
        &SnapshotOptions::default(),
    )
    .unwrap();

    assert_eq!(result.manifest.entries.len(), 1);
    assert_eq!(result.manifest.entries[0].path, "main.rs");
}

#[cfg(unix)]
#[test]
fn symlink_escaping_workspace_is_skipped() {
    let outside = tempdir().unwrap();
    write(&outside.path().join("secret.txt"), "not yours\n");

    let ws = tempdir().unwrap();
    write(&ws.path().join("ok.txt"), "fine\n");
    std::os::unix::fs::symlink(
        outside.path().join("secret.txt"),
        ws.path().join("sneaky.txt"),
    )
    .unwrap();

    let out = tempdir().unwrap();
    let result = snapshot_workspace(
        ws.path(),
        &out.path().join("snap.zip"),
        &SnapshotOptions::default(),
    )
    .unwrap();

    let paths: Vec<&str> =
        result.manifest.entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["ok.txt"]);
    assert!(result.skipped >= 1);
}

#[cfg(unix)]
#[test]
fn internal_symlink_is_included() {
    let ws = tempdir().unwrap();
    write(&ws.path().join("real.txt"), "content\n");
    std::os::unix::fs::symlink(ws.path().join("real.txt"), ws.path().join("alias.txt"))
        .unwrap();

    let out = tempdir().unwrap();
    let result = snapshot_workspace(
        ws.path(),
        &out.path().join("snap.zip"),
        &SnapshotOptions::default(),
    )
    .unwrap();

    let paths: Vec<&str> =
        result.manifest.entries.iter().map(|e| e.path.as_str()).collect();
    assert!(paths.contains(&"alias.txt"));
    assert!(paths.contains(&"real.txt"));
}

#[test]
fn size_cap_is_enforced() {
    let ws = tempdir().unwrap();
    write(&ws.path().join("big.bin"), &"x".repeat(1000));

    let out = tempdir().unwrap();
    let result = snapshot_workspace(
        ws.path(),
        &out.path().join("snap.zip"),
        &SnapshotOptions { max_total_bytes: Some(100) },
    );
    assert!(matches!(result, Err(ArchiveError::SnapshotTooLarge { .. })));
}

#[test]
fn fingerprint_is_stable_across_snapshots() {
    let ws = tempdir().unwrap();
    write(&ws.path().join("a.txt"), "alpha\n");
    write(&ws.path().join("b.txt"), "beta\n");

    let out = tempdir().unwrap();
    let first = snapshot_workspace(
        ws.path(),
        &out.path().join("one.zip"),
        &SnapshotOptions::default(),
    )
    .unwrap();
    let second = snapshot_workspace(
        ws.path(),
        &out.path().join("two.zip"),
        &SnapshotOptions::default(),
    )
    .unwrap();

    assert_eq!(first.manifest.fingerprint(), second.manifest.fingerprint());
}
