// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::super::Db;
use super::*;

fn rows(n: usize) -> Vec<MetricRow> {
    (0..n)
        .map(|i| MetricRow {
            timestamp: i as f64,
            metric_name: "loss".to_string(),
            value: Some(1.0 / (i + 1) as f64),
            step: i as i64,
            stage: None,
        })
        .collect()
}

#[test]
fn upsert_writes_all_rows() {
    let db = Db::open_in_memory().unwrap();
    let written = upsert_metrics(db.conn(), "20240101_000000_aaaaaa", &rows(10), 99.0).unwrap();
    assert_eq!(written, 10);
    assert_eq!(count_for_run(db.conn(), "20240101_000000_aaaaaa").unwrap(), 10);
}

#[test]
fn upsert_collapses_duplicate_keys() {
    let db = Db::open_in_memory().unwrap();
    let batch = rows(5);
    upsert_metrics(db.conn(), "20240101_000000_aaaaaa", &batch, 1.0).unwrap();
    upsert_metrics(db.conn(), "20240101_000000_aaaaaa", &batch, 2.0).unwrap();
    assert_eq!(count_for_run(db.conn(), "20240101_000000_aaaaaa").unwrap(), 5);
}

#[test]
fn upsert_spans_batches() {
    let db = Db::open_in_memory().unwrap();
    let written =
        upsert_metrics(db.conn(), "20240101_000000_aaaaaa", &rows(BATCH_SIZE + 7), 1.0).unwrap();
    assert_eq!(written, BATCH_SIZE + 7);
    assert_eq!(
        count_for_run(db.conn(), "20240101_000000_aaaaaa").unwrap(),
        (BATCH_SIZE + 7) as i64
    );
}

#[test]
fn metric_names_are_distinct_and_sorted() {
    let db = Db::open_in_memory().unwrap();
    let mut batch = rows(3);
    batch.push(MetricRow {
        timestamp: 100.0,
        metric_name: "acc".to_string(),
        value: Some(0.9),
        step: 3,
        stage: Some("val".to_string()),
    });
    upsert_metrics(db.conn(), "20240101_000000_aaaaaa", &batch, 1.0).unwrap();

    let names = metric_names(db.conn(), "20240101_000000_aaaaaa").unwrap();
    assert_eq!(names, vec!["acc".to_string(), "loss".to_string()]);
}

#[test]
fn null_values_round_trip() {
    let db = Db::open_in_memory().unwrap();
    let batch = vec![MetricRow {
        timestamp: 1.0,
        metric_name: "nanful".to_string(),
        value: None,
        step: 0,
        stage: None,
    }];
    upsert_metrics(db.conn(), "20240101_000000_aaaaaa", &batch, 1.0).unwrap();

    let value: Option<f64> = db
        .conn()
        .query_row("SELECT value FROM metrics WHERE metric_name = 'nanful'", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(value, None);
}
