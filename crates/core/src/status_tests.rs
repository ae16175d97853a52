// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    max_improves = { MetricMode::Max, 0.7, 0.4, true },
    max_tie = { MetricMode::Max, 0.4, 0.4, false },
    max_worse = { MetricMode::Max, 0.3, 0.4, false },
    min_improves = { MetricMode::Min, 0.1, 0.4, true },
    min_tie = { MetricMode::Min, 0.4, 0.4, false },
    min_worse = { MetricMode::Min, 0.5, 0.4, false },
)]
fn mode_improves(mode: MetricMode, candidate: f64, current: f64, expected: bool) {
    assert_eq!(mode.improves(candidate, current), expected);
}

#[test]
fn best_metric_observe_updates_on_improvement() {
    let mut best = BestMetric {
        name: "acc".to_string(),
        value: 0.4,
        step: 1,
        mode: MetricMode::Max,
    };

    assert!(best.observe(0.7, 2));
    assert_eq!(best.value, 0.7);
    assert_eq!(best.step, 2);

    // Worse value leaves the best alone
    assert!(!best.observe(0.6, 3));
    assert_eq!(best.step, 2);

    // Tie keeps the earlier step
    assert!(!best.observe(0.7, 4));
    assert_eq!(best.step, 2);
}

#[test]
fn best_metric_ignores_nan_and_recovers_from_nan_seed() {
    let mut best = BestMetric {
        name: "loss".to_string(),
        value: f64::NAN,
        step: 0,
        mode: MetricMode::Min,
    };

    assert!(!best.observe(f64::NAN, 1));
    assert!(best.observe(2.5, 2));
    assert_eq!(best.value, 2.5);
}

#[test]
fn timestamp_accepts_epoch_and_rfc3339() {
    let from_epoch: Timestamp = serde_json::from_str("1704067200.25").unwrap();
    let from_text: Timestamp =
        serde_json::from_str("\"2024-01-01T00:00:00.250+00:00\"").unwrap();
    assert_eq!(from_epoch, from_text);
}

#[test]
fn timestamp_serializes_as_rfc3339() {
    let ts = Timestamp::from_epoch_secs(1_704_067_200.0);
    let json = serde_json::to_string(&ts).unwrap();
    assert!(json.starts_with("\"2024-01-01T00:00:00"));
}

#[test]
fn status_file_tolerates_unknown_fields() {
    let json = r#"{
        "status": "running",
        "updated_at": 1704067200.0,
        "heartbeat_count": 42,
        "sdk_build": "abc"
    }"#;
    let status: StatusFile = serde_json::from_str(json).unwrap();
    assert_eq!(status.status, RunStatus::Running);
    assert!(status.best_metric.is_none());
}

#[test]
fn meta_effective_path_prefers_path() {
    let json = r#"{
        "run_id": "20240101_000000_abc123",
        "path": "vision/resnet",
        "project": "legacy",
        "name": "old",
        "created_at": 1704067200.0
    }"#;
    let meta: RunMeta = serde_json::from_str(json).unwrap();
    assert_eq!(meta.effective_path().as_str(), "vision/resnet");
}

#[test]
fn meta_effective_path_synthesizes_from_legacy() {
    let json = r#"{
        "run_id": "20240101_000000_abc123",
        "project": "proj",
        "name": "exp",
        "created_at": "2024-01-01T00:00:00Z"
    }"#;
    let meta: RunMeta = serde_json::from_str(json).unwrap();
    assert_eq!(meta.effective_path().as_str(), "proj/exp");
}

#[test]
fn meta_without_any_label_lands_in_unsorted() {
    let json = r#"{
        "run_id": "20240101_000000_abc123",
        "created_at": 1704067200.0
    }"#;
    let meta: RunMeta = serde_json::from_str(json).unwrap();
    assert_eq!(meta.effective_path().as_str(), "_unsorted");
}

#[test]
fn fold_summary_replaces_and_removes_keys() {
    let mut snapshot = HashMap::new();
    fold_summary(&mut snapshot, &serde_json::json!({"lr": 0.1, "epochs": 10}));
    fold_summary(&mut snapshot, &serde_json::json!({"lr": 0.01, "epochs": null}));

    assert_eq!(snapshot.get("lr"), Some(&serde_json::json!(0.01)));
    assert!(!snapshot.contains_key("epochs"));
}
