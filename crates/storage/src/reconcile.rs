// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem → mirror reconciliation and zombie detection
//!
//! Runs at startup and on every watcher tick. The mirror is only ever a
//! cache: every decision here re-derives from `meta.json`/`status.json`,
//! and rows whose directory vanished are dropped.

use crate::db::experiments::{self, ExperimentRow};
use crate::db::pool::DbPool;
use crate::layout::StorageLayout;
use crate::rundir::RunDir;
use crate::StorageError;
use rn_core::{Clock, RunStatus};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Upserts per write transaction.
const UPSERT_BATCH: usize = 500;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub discovered: usize,
    pub upserted: usize,
    pub removed: usize,
    pub zombies: usize,
}

/// One full reconciliation pass: upsert every discovered run, drop vanished
/// rows, then sweep zombies.
pub fn reconcile(
    layout: &StorageLayout,
    pool: &DbPool,
    clock: &impl Clock,
    zombie_threshold_hours: u64,
) -> Result<ReconcileReport, StorageError> {
    let mut report = ReconcileReport::default();
    let discovered = layout.discover_runs();
    report.discovered = discovered.len();

    let now = clock.epoch_secs();
    let mut seen: HashSet<String> = HashSet::with_capacity(discovered.len());
    for batch in discovered.chunks(UPSERT_BATCH) {
        let mut rows = Vec::with_capacity(batch.len());
        for location in batch {
            seen.insert(location.run_id.to_string());
            match read_row(&location.dir, &location.path.to_string()) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    warn!(run_id = %location.run_id, error = %e,
                        "skipping run with unreadable metadata");
                }
            }
        }
        let written = pool.with_write(|db| {
            db.with_savepoint(|sp| {
                for (row, tags) in &rows {
                    experiments::upsert(sp, row)?;
                    experiments::replace_tags(sp, &row.run_id, tags, now)?;
                    let dir = std::path::Path::new(&row.run_dir);
                    experiments::record_files(
                        sp,
                        &row.run_id,
                        &[
                            ("meta", &dir.join(crate::layout::META_FILE)),
                            ("events", &dir.join(crate::layout::EVENTS_FILE)),
                            ("logs", &dir.join(crate::layout::LOGS_FILE)),
                        ],
                        now,
                    )?;
                }
                Ok(rows.len())
            })
        })?;
        report.upserted += written;
    }

    // Drop rows whose directory no longer exists
    let mirrored = pool.with_read(|conn| experiments::all_run_dirs(conn))?;
    for (run_id, run_dir) in mirrored {
        if !seen.contains(&run_id) && !std::path::Path::new(&run_dir).exists() {
            pool.with_write(|db| experiments::delete_row(db.conn(), &run_id))?;
            report.removed += 1;
            debug!(run_id = %run_id, "removed vanished run from mirror");
        }
    }

    report.zombies = zombie_sweep(pool, clock, zombie_threshold_hours)?;
    if report.removed > 0 || report.zombies > 0 {
        info!(
            discovered = report.discovered,
            removed = report.removed,
            zombies = report.zombies,
            "reconciliation pass complete"
        );
    }
    Ok(report)
}

/// Build a mirror row (plus the run's tag set) from one run directory.
fn read_row(
    dir: &std::path::Path,
    path: &str,
) -> Result<(ExperimentRow, Vec<String>), StorageError> {
    let run = RunDir::new(dir);
    let meta = run.meta()?;
    let status = run.status();

    let created_at = meta.created_at.epoch_secs();
    let started_at = status.as_ref().and_then(|s| s.started_at).map(|t| t.epoch_secs());
    let ended_at = status.as_ref().and_then(|s| s.ended_at).map(|t| t.epoch_secs());
    let updated_at = status.as_ref().map(|s| s.updated_at.epoch_secs());
    let best = status.as_ref().and_then(|s| s.best_metric.clone());

    let duration_seconds = match (started_at, ended_at) {
        (Some(start), Some(end)) if end >= start => Some(end - start),
        _ => None,
    };

    let row = ExperimentRow {
        run_id: meta.run_id.to_string(),
        // The on-disk location is authoritative; meta.path matches it for
        // every SDK-written run
        path: path.to_string(),
        alias: meta.alias.clone(),
        created_at,
        updated_at,
        started_at,
        ended_at,
        status: status
            .as_ref()
            .map(|s| s.status.as_str().to_string())
            .unwrap_or_else(|| RunStatus::Running.as_str().to_string()),
        pid: meta.pid,
        hostname: meta.hostname.clone(),
        python_version: meta.python_version.clone(),
        platform: meta.platform.clone(),
        best_metric_name: best.as_ref().map(|b| b.name.clone()),
        best_metric_value: best.as_ref().map(|b| b.value),
        best_metric_step: best.as_ref().map(|b| b.step),
        best_metric_mode: best.as_ref().map(|b| match b.mode {
            rn_core::MetricMode::Max => "max".to_string(),
            rn_core::MetricMode::Min => "min".to_string(),
        }),
        deleted_at: None,
        delete_reason: None,
        run_dir: dir.to_string_lossy().into_owned(),
        duration_seconds,
        metric_count: run.metric_count() as i64,
    };
    Ok((row, meta.tags))
}

/// Transition stale `running` rows to `interrupted`.
///
/// A run is a zombie when its heartbeat (`updated_at`) is older than the
/// threshold, or when it was started on this host and its PID is gone.
pub fn zombie_sweep(
    pool: &DbPool,
    clock: &impl Clock,
    zombie_threshold_hours: u64,
) -> Result<usize, StorageError> {
    let now = clock.epoch_secs();
    let cutoff = now - (zombie_threshold_hours * 3600) as f64;
    let local_host = local_hostname();

    let running: Vec<ExperimentRow> = pool.with_read(|conn| {
        let (rows, _) = experiments::list(
            conn,
            &experiments::RunFilter {
                status: Some(RunStatus::Running),
                deleted: experiments::DeletedFilter::All,
                per_page: 1000,
                ..Default::default()
            },
        )?;
        Ok(rows)
    })?;

    let mut transitioned = 0;
    for row in running {
        let heartbeat_stale = row.updated_at.unwrap_or(row.created_at) < cutoff;
        let pid_dead = match (&row.hostname, row.pid, &local_host) {
            // PID probes only mean anything on the host that spawned the run
            (Some(host), Some(pid), Some(local)) if host == local => !pid_alive(pid),
            _ => false,
        };
        if !(heartbeat_stale || pid_dead) {
            continue;
        }
        let changed =
            pool.with_write(|db| experiments::mark_interrupted(db.conn(), &row.run_id, now))?;
        if changed {
            transitioned += 1;
            info!(
                run_id = %row.run_id,
                heartbeat_stale,
                pid_dead,
                "zombie run marked interrupted"
            );
        }
    }
    Ok(transitioned)
}

fn local_hostname() -> Option<String> {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
}

fn pid_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    // Signal 0: existence probe without touching the process
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
