// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rn_core::test_support::RunDirBuilder;
use rn_core::{FakeClock, MetricMode};
use rn_storage::db::metrics_mirror;
use tempfile::tempdir;

struct Fixture {
    _root: tempfile::TempDir,
    layout: StorageLayout,
    pool: DbPool,
    store: BlobStore,
    cache: MetricsCache,
    clock: FakeClock,
    config: WatcherConfig,
}

fn fixture() -> Fixture {
    let root = tempdir().unwrap();
    let layout = StorageLayout::new(root.path());
    let pool = DbPool::open(&layout.db_path()).unwrap();
    let store = BlobStore::open(&layout.archive_dir()).unwrap();
    Fixture {
        _root: root,
        layout,
        pool,
        store,
        cache: MetricsCache::new(100),
        clock: FakeClock::new(),
        config: WatcherConfig::default(),
    }
}

fn one_tick(f: &Fixture, mirrored: &mut std::collections::HashMap<String, u64>) {
    tick(
        &f.layout,
        &f.pool,
        &f.store,
        &f.cache,
        &f.clock,
        &f.config,
        mirrored,
    )
    .unwrap();
}

#[test]
fn tick_reconciles_and_mirrors_metrics() {
    let f = fixture();
    RunDirBuilder::new("20240101_000000_aaaaaa", "proj")
        .metric(1.0, 1, "loss", 0.9)
        .metric(2.0, 2, "loss", 0.7)
        .write(f.layout.root());

    let mut mirrored = Default::default();
    one_tick(&f, &mut mirrored);

    let row = f
        .pool
        .with_read(|conn| experiments::get(conn, "20240101_000000_aaaaaa"))
        .unwrap()
        .unwrap();
    assert_eq!(row.metric_count, 2);
    let mirrored_count = f
        .pool
        .with_read(|conn| metrics_mirror::count_for_run(conn, "20240101_000000_aaaaaa"))
        .unwrap();
    assert_eq!(mirrored_count, 2);
}

#[test]
fn second_tick_mirrors_only_the_tail() {
    let f = fixture();
    let dir = RunDirBuilder::new("20240101_000000_aaaaaa", "proj")
        .metric(1.0, 1, "loss", 0.9)
        .write(f.layout.root());

    let mut mirrored = Default::default();
    one_tick(&f, &mut mirrored);
    assert_eq!(mirrored.get("20240101_000000_aaaaaa"), Some(&1));

    use std::io::Write as _;
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(dir.join("events.jsonl"))
        .unwrap();
    writeln!(file, r#"{{"type":"metric","ts":2.0,"step":2,"name":"loss","value":0.8}}"#)
        .unwrap();
    drop(file);

    one_tick(&f, &mut mirrored);
    assert_eq!(mirrored.get("20240101_000000_aaaaaa"), Some(&2));
    assert_eq!(f.cache.stats().incremental_updates, 1);

    let count = f
        .pool
        .with_read(|conn| metrics_mirror::count_for_run(conn, "20240101_000000_aaaaaa"))
        .unwrap();
    assert_eq!(count, 2);
}

#[test]
fn best_metric_backfilled_when_status_lacks_it() {
    let f = fixture();
    RunDirBuilder::new("20240101_000000_aaaaaa", "proj")
        .primary_metric("acc", MetricMode::Max)
        .raw_event_line(r#"{"type":"metric","ts":1.0,"step":1,"name":"acc","value":0.4}"#)
        .raw_event_line(r#"{"type":"metric","ts":2.0,"step":2,"name":"acc","value":0.7}"#)
        .raw_event_line(r#"{"type":"metric","ts":3.0,"step":3,"name":"acc","value":0.6}"#)
        .write(f.layout.root());

    let mut mirrored = Default::default();
    one_tick(&f, &mut mirrored);

    let row = f
        .pool
        .with_read(|conn| experiments::get(conn, "20240101_000000_aaaaaa"))
        .unwrap()
        .unwrap();
    assert_eq!(row.best_metric_name.as_deref(), Some("acc"));
    assert_eq!(row.best_metric_value, Some(0.7));
    assert_eq!(row.best_metric_step, Some(2));
    assert_eq!(row.best_metric_mode.as_deref(), Some("max"));
}

#[tokio::test]
async fn watcher_stops_on_cancellation() {
    let f = fixture();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run_watcher(
        f.layout.clone(),
        f.pool.clone(),
        f.store.clone(),
        Arc::new(MetricsCache::new(10)),
        f.clock.clone(),
        WatcherConfig { interval: Duration::from_millis(50), ..Default::default() },
        cancel.clone(),
    ));

    tokio::time::sleep(Duration::from_millis(120)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("watcher did not stop after cancellation")
        .unwrap();
}
