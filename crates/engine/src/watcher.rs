// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The run watcher
//!
//! One task per Viewer process. Each tick reconciles the mirror against the
//! filesystem, mirrors new metric rows, re-derives best metrics for runs
//! whose writer did not record one, and expires old recycle-bin tombstones.
//! Filesystem notifications only shorten the wait for the next tick;
//! correctness never depends on them.

use crate::best::fold_best;
use crate::cache::MetricsCache;
use crate::EngineError;
use rn_archive::BlobStore;
use rn_core::Clock;
use rn_storage::db::metrics_mirror::{self, MetricRow};
use rn_storage::db::{experiments, pool::DbPool};
use rn_storage::{reconcile, RecycleBin, RunDir, StorageLayout};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub interval: Duration,
    pub zombie_threshold_hours: u64,
    pub recycle_retention_days: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            zombie_threshold_hours: 48,
            recycle_retention_days: 30,
        }
    }
}

/// Run the watcher loop until cancelled.
pub async fn run_watcher(
    layout: StorageLayout,
    pool: DbPool,
    store: BlobStore,
    cache: Arc<MetricsCache>,
    clock: impl Clock + 'static,
    config: WatcherConfig,
    cancel: CancellationToken,
) {
    info!(interval_secs = config.interval.as_secs(), "run watcher started");
    let mut fs_events = spawn_fs_watch(layout.root().to_path_buf());
    let mut mirrored: HashMap<String, u64> = HashMap::new();

    loop {
        let layout = layout.clone();
        let pool_for_tick = pool.clone();
        let store = store.clone();
        let cache_for_tick = Arc::clone(&cache);
        let clock_for_tick = clock.clone();
        let config_for_tick = config.clone();
        let mut state = std::mem::take(&mut mirrored);

        let joined = tokio::task::spawn_blocking(move || {
            let result = tick(
                &layout,
                &pool_for_tick,
                &store,
                &cache_for_tick,
                &clock_for_tick,
                &config_for_tick,
                &mut state,
            );
            (result, state)
        })
        .await;

        match joined {
            Ok((Ok(()), state)) => mirrored = state,
            Ok((Err(e), state)) => {
                mirrored = state;
                warn!(error = %e, "watcher tick failed");
            }
            Err(e) => warn!(error = %e, "watcher tick panicked"),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(config.interval) => {}
            Some(()) = fs_events.recv() => {
                debug!("filesystem change woke the watcher early");
                // Debounce: let the writer finish its burst
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }
    info!("run watcher stopped");
}

/// One watcher tick, on a blocking thread.
fn tick(
    layout: &StorageLayout,
    pool: &DbPool,
    store: &BlobStore,
    cache: &MetricsCache,
    clock: &impl Clock,
    config: &WatcherConfig,
    mirrored: &mut HashMap<String, u64>,
) -> Result<(), EngineError> {
    reconcile::reconcile(layout, pool, clock, config.zombie_threshold_hours)?;
    mirror_metrics(layout, pool, cache, clock, mirrored)?;

    let bin = RecycleBin::new(layout.clone(), pool.clone());
    bin.purge_expired(store, config.recycle_retention_days, clock)?;
    Ok(())
}

/// Mirror newly appended metric points into SQLite and backfill best
/// metrics the writer never recorded.
fn mirror_metrics(
    layout: &StorageLayout,
    pool: &DbPool,
    cache: &MetricsCache,
    clock: &impl Clock,
    mirrored: &mut HashMap<String, u64>,
) -> Result<(), EngineError> {
    let now = clock.epoch_secs();
    for location in layout.discover_runs() {
        let run_dir = RunDir::new(&location.dir);
        let run_id = location.run_id.to_string();
        let events = cache.get(&run_id, &run_dir.events_path())?;

        let already = mirrored.get(&run_id).copied().unwrap_or(0) as usize;
        if events.points.len() > already {
            let rows: Vec<MetricRow> = events.points[already..]
                .iter()
                .map(|p| MetricRow {
                    timestamp: p.ts,
                    metric_name: events.metric_names[p.name_idx].clone(),
                    value: p.value,
                    step: p.step,
                    stage: p.stage.clone(),
                })
                .collect();
            pool.with_write(|db| {
                metrics_mirror::upsert_metrics(db.conn(), &run_id, &rows, now)
            })?;
            mirrored.insert(run_id.clone(), events.points.len() as u64);
        }

        // Writers normally maintain best_metric in status.json; when one
        // died early the fold from events is the only source
        let status_best = run_dir.status().and_then(|s| s.best_metric);
        if status_best.is_none() {
            let meta_primary = run_dir.meta().ok().and_then(|m| m.primary_metric);
            if let Some(best) = fold_best(&events, meta_primary.as_ref()) {
                pool.with_write(|db| experiments::update_best(db.conn(), &run_id, &best))?;
            }
        }
    }
    Ok(())
}

/// Best-effort filesystem notifications. Returns a receiver that yields a
/// unit per change burst; an empty channel if the platform watcher fails.
fn spawn_fs_watch(root: std::path::PathBuf) -> tokio::sync::mpsc::Receiver<()> {
    use notify::Watcher as _;

    let (tx, rx) = tokio::sync::mpsc::channel(1);
    let watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
        if result.is_ok() {
            // A full channel already has a pending wake-up
            let _ = tx.try_send(());
        }
    });
    match watcher {
        Ok(mut watcher) => {
            if let Err(e) = watcher.watch(&root, notify::RecursiveMode::Recursive) {
                warn!(error = %e, "filesystem watch unavailable, relying on periodic scan");
                return rx;
            }
            // Keep the watcher alive for the process lifetime
            std::mem::forget(watcher);
        }
        Err(e) => {
            warn!(error = %e, "filesystem watcher init failed, relying on periodic scan");
        }
    }
    rx
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
