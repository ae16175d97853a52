// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rn_core::test_support::RunDirBuilder;
use rn_core::RunStatus;
use tempfile::tempdir;

#[test]
fn reads_meta_and_status() {
    let root = tempdir().unwrap();
    let dir = RunDirBuilder::new("20240101_000000_aaaaaa", "proj")
        .status(RunStatus::Finished)
        .write(root.path());

    let run = RunDir::new(&dir);
    let meta = run.meta().unwrap();
    assert_eq!(meta.run_id.as_str(), "20240101_000000_aaaaaa");
    assert_eq!(meta.effective_path().as_str(), "proj");

    let status = run.status().unwrap();
    assert_eq!(status.status, RunStatus::Finished);
}

#[test]
fn missing_status_is_none() {
    let root = tempdir().unwrap();
    let dir = RunDirBuilder::new("20240101_000000_aaaaaa", "proj").write(root.path());
    std::fs::remove_file(dir.join("status.json")).unwrap();

    let run = RunDir::new(&dir);
    assert!(run.status().is_none());
}

#[test]
fn metric_count_counts_only_metric_lines() {
    let root = tempdir().unwrap();
    let dir = RunDirBuilder::new("20240101_000000_aaaaaa", "proj")
        .metric(1.0, 1, "loss", 0.9)
        .metric(2.0, 2, "loss", 0.7)
        .raw_event_line(r#"{"type":"log","ts":3.0,"text":"epoch done"}"#)
        .raw_event_line(r#"{"type":"future_thing","ts":4.0}"#)
        .raw_event_line("not json at all")
        .write(root.path());

    assert_eq!(RunDir::new(&dir).metric_count(), 2);
}

#[test]
fn partial_trailing_line_is_ignored() {
    let root = tempdir().unwrap();
    let dir = RunDirBuilder::new("20240101_000000_aaaaaa", "proj")
        .metric(1.0, 1, "loss", 0.9)
        .write(root.path());
    // Simulate a writer caught mid-append
    use std::io::Write as _;
    let mut f = std::fs::OpenOptions::new()
        .append(true)
        .open(dir.join("events.jsonl"))
        .unwrap();
    write!(f, r#"{{"type":"metric","ts":2.0,"step":2,"na"#).unwrap();

    assert_eq!(RunDir::new(&dir).metric_count(), 1);
}

#[test]
fn folded_summary_applies_events_over_file() {
    let root = tempdir().unwrap();
    let dir = RunDirBuilder::new("20240101_000000_aaaaaa", "proj")
        .raw_event_line(r#"{"type":"summary","ts":1.0,"update":{"lr":0.1,"optimizer":"sgd"}}"#)
        .raw_event_line(r#"{"type":"summary","ts":2.0,"update":{"lr":0.01,"optimizer":null}}"#)
        .write(root.path());
    std::fs::write(dir.join("summary.json"), r#"{"seed": 7}"#).unwrap();

    let summary = RunDir::new(&dir).folded_summary();
    assert_eq!(summary.get("seed"), Some(&serde_json::json!(7)));
    assert_eq!(summary.get("lr"), Some(&serde_json::json!(0.01)));
    assert!(!summary.contains_key("optimizer"));
}

#[test]
fn asset_count_reads_manifest() {
    let root = tempdir().unwrap();
    let dir = RunDirBuilder::new("20240101_000000_aaaaaa", "proj").write(root.path());
    assert_eq!(RunDir::new(&dir).asset_count(), 0);

    std::fs::write(
        dir.join("assets.json"),
        r#"{"version":1,"assets":[{"kind":"config","name":"cfg","saved":false}]}"#,
    )
    .unwrap();
    assert_eq!(RunDir::new(&dir).asset_count(), 1);
}
