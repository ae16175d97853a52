// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queries over the `experiments` table

use crate::StorageError;
use rn_core::{MetricMode, RunStatus};
use rusqlite::{params, Connection, Row};
use serde::Serialize;

/// One mirrored run. Timestamps are epoch seconds.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExperimentRow {
    pub run_id: String,
    pub path: String,
    pub alias: Option<String>,
    pub created_at: f64,
    pub updated_at: Option<f64>,
    pub started_at: Option<f64>,
    pub ended_at: Option<f64>,
    pub status: String,
    pub pid: Option<u32>,
    pub hostname: Option<String>,
    pub python_version: Option<String>,
    pub platform: Option<String>,
    pub best_metric_name: Option<String>,
    pub best_metric_value: Option<f64>,
    pub best_metric_step: Option<i64>,
    pub best_metric_mode: Option<String>,
    pub deleted_at: Option<f64>,
    pub delete_reason: Option<String>,
    pub run_dir: String,
    pub duration_seconds: Option<f64>,
    pub metric_count: i64,
}

impl ExperimentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            run_id: row.get("run_id")?,
            path: row.get("path")?,
            alias: row.get("alias")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            started_at: row.get("started_at")?,
            ended_at: row.get("ended_at")?,
            status: row.get("status")?,
            pid: row.get("pid")?,
            hostname: row.get("hostname")?,
            python_version: row.get("python_version")?,
            platform: row.get("platform")?,
            best_metric_name: row.get("best_metric_name")?,
            best_metric_value: row.get("best_metric_value")?,
            best_metric_step: row.get("best_metric_step")?,
            best_metric_mode: row.get("best_metric_mode")?,
            deleted_at: row.get("deleted_at")?,
            delete_reason: row.get("delete_reason")?,
            run_dir: row.get("run_dir")?,
            duration_seconds: row.get("duration_seconds")?,
            metric_count: row.get("metric_count")?,
        })
    }

    pub fn run_status(&self) -> Option<RunStatus> {
        RunStatus::parse(&self.status)
    }

    pub fn best_mode(&self) -> Option<MetricMode> {
        match self.best_metric_mode.as_deref() {
            Some("max") => Some(MetricMode::Max),
            Some("min") => Some(MetricMode::Min),
            _ => None,
        }
    }
}

/// Soft-delete visibility filter for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletedFilter {
    /// Only live runs (the default listing).
    #[default]
    Live,
    /// Only soft-deleted runs.
    Deleted,
    /// Everything.
    All,
}

/// Filters for `list`.
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    /// Exact path or path prefix (whole segments).
    pub path: Option<String>,
    pub status: Option<RunStatus>,
    pub deleted: DeletedFilter,
    /// Substring match over run_id, alias, and path.
    pub search: Option<String>,
    pub page: usize,
    pub per_page: usize,
}

impl RunFilter {
    pub fn effective_per_page(&self) -> usize {
        match self.per_page {
            0 => 50,
            n => n.min(1000),
        }
    }
}

const ALL_COLUMNS: &str = "run_id, path, alias, created_at, updated_at, started_at, ended_at, \
     status, pid, hostname, python_version, platform, best_metric_name, best_metric_value, \
     best_metric_step, best_metric_mode, deleted_at, delete_reason, run_dir, duration_seconds, \
     metric_count";

/// Insert or refresh one mirrored run. The conflict target is `run_id`;
/// reconciliation calls this for every discovered run.
pub fn upsert(conn: &Connection, row: &ExperimentRow) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO experiments (run_id, path, alias, created_at, updated_at, started_at, \
         ended_at, status, pid, hostname, python_version, platform, best_metric_name, \
         best_metric_value, best_metric_step, best_metric_mode, deleted_at, delete_reason, \
         run_dir, duration_seconds, metric_count) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, \
         ?18, ?19, ?20, ?21) \
         ON CONFLICT(run_id) DO UPDATE SET \
           path = excluded.path, \
           alias = excluded.alias, \
           updated_at = excluded.updated_at, \
           started_at = excluded.started_at, \
           ended_at = excluded.ended_at, \
           status = excluded.status, \
           pid = excluded.pid, \
           hostname = excluded.hostname, \
           python_version = excluded.python_version, \
           platform = excluded.platform, \
           best_metric_name = excluded.best_metric_name, \
           best_metric_value = excluded.best_metric_value, \
           best_metric_step = excluded.best_metric_step, \
           best_metric_mode = excluded.best_metric_mode, \
           run_dir = excluded.run_dir, \
           duration_seconds = excluded.duration_seconds, \
           metric_count = excluded.metric_count",
        params![
            row.run_id,
            row.path,
            row.alias,
            row.created_at,
            row.updated_at,
            row.started_at,
            row.ended_at,
            row.status,
            row.pid,
            row.hostname,
            row.python_version,
            row.platform,
            row.best_metric_name,
            row.best_metric_value,
            row.best_metric_step,
            row.best_metric_mode,
            row.deleted_at,
            row.delete_reason,
            row.run_dir,
            row.duration_seconds,
            row.metric_count,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, run_id: &str) -> Result<Option<ExperimentRow>, StorageError> {
    let sql = format!("SELECT {ALL_COLUMNS} FROM experiments WHERE run_id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![run_id], ExperimentRow::from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// List runs under `filter`, newest first. Returns `(rows, total)` where
/// `total` counts matches before paging.
pub fn list(
    conn: &Connection,
    filter: &RunFilter,
) -> Result<(Vec<ExperimentRow>, usize), StorageError> {
    let mut where_clauses: Vec<String> = Vec::new();
    let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    match filter.deleted {
        DeletedFilter::Live => where_clauses.push("deleted_at IS NULL".to_string()),
        DeletedFilter::Deleted => where_clauses.push("deleted_at IS NOT NULL".to_string()),
        DeletedFilter::All => {}
    }
    if let Some(path) = &filter.path {
        where_clauses
            .push(format!("(path = ?{n} OR path LIKE ?{n} || '/%')", n = args.len() + 1));
        args.push(Box::new(path.clone()));
    }
    if let Some(status) = filter.status {
        where_clauses.push(format!("status = ?{}", args.len() + 1));
        args.push(Box::new(status.as_str().to_string()));
    }
    if let Some(search) = &filter.search {
        let n = args.len() + 1;
        where_clauses.push(format!(
            "(run_id LIKE '%' || ?{n} || '%' OR path LIKE '%' || ?{n} || '%' \
             OR alias LIKE '%' || ?{n} || '%')"
        ));
        args.push(Box::new(search.clone()));
    }

    let where_sql = if where_clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", where_clauses.join(" AND "))
    };

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        args.iter().map(|b| b.as_ref()).collect();

    let count_sql = format!("SELECT COUNT(*) FROM experiments {where_sql}");
    let total: usize =
        conn.query_row(&count_sql, params_ref.as_slice(), |row| row.get::<_, i64>(0))? as usize;

    let per_page = filter.effective_per_page();
    let offset = filter.page.saturating_sub(1).saturating_mul(per_page);
    let list_sql = format!(
        "SELECT {ALL_COLUMNS} FROM experiments {where_sql} \
         ORDER BY created_at DESC, run_id DESC LIMIT {per_page} OFFSET {offset}"
    );
    let mut stmt = conn.prepare(&list_sql)?;
    let rows = stmt
        .query_map(params_ref.as_slice(), ExperimentRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok((rows, total))
}

/// Set `deleted_at` on the given runs. Returns how many rows changed.
pub fn soft_delete(
    conn: &Connection,
    run_ids: &[String],
    reason: Option<&str>,
    now: f64,
) -> Result<usize, StorageError> {
    let mut changed = 0;
    for run_id in run_ids {
        changed += conn.execute(
            "UPDATE experiments SET deleted_at = ?1, delete_reason = ?2 \
             WHERE run_id = ?3 AND deleted_at IS NULL",
            params![now, reason, run_id],
        )?;
    }
    Ok(changed)
}

/// Clear `deleted_at` on the given runs.
pub fn restore(conn: &Connection, run_ids: &[String]) -> Result<usize, StorageError> {
    let mut changed = 0;
    for run_id in run_ids {
        changed += conn.execute(
            "UPDATE experiments SET deleted_at = NULL, delete_reason = NULL \
             WHERE run_id = ?1 AND deleted_at IS NOT NULL",
            params![run_id],
        )?;
    }
    Ok(changed)
}

/// Remove a row entirely (the directory vanished or was purged).
pub fn delete_row(conn: &Connection, run_id: &str) -> Result<bool, StorageError> {
    let n = conn.execute("DELETE FROM experiments WHERE run_id = ?1", params![run_id])?;
    conn.execute("DELETE FROM metrics WHERE run_id = ?1", params![run_id])?;
    conn.execute("DELETE FROM experiment_tags WHERE run_id = ?1", params![run_id])?;
    conn.execute("DELETE FROM environments WHERE run_id = ?1", params![run_id])?;
    conn.execute("DELETE FROM experiment_files WHERE run_id = ?1", params![run_id])?;
    Ok(n > 0)
}

/// All run IDs currently mirrored, with their run_dir.
pub fn all_run_dirs(conn: &Connection) -> Result<Vec<(String, String)>, StorageError> {
    let mut stmt = conn.prepare("SELECT run_id, run_dir FROM experiments")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Mark one run `interrupted`, recording when. Returns true if the row was
/// still `running`.
pub fn mark_interrupted(conn: &Connection, run_id: &str, now: f64) -> Result<bool, StorageError> {
    let n = conn.execute(
        "UPDATE experiments SET status = 'interrupted', ended_at = COALESCE(ended_at, ?1) \
         WHERE run_id = ?2 AND status = 'running'",
        params![now, run_id],
    )?;
    Ok(n > 0)
}

/// Replace a run's tag set with the one from `meta.json`.
pub fn replace_tags(
    conn: &Connection,
    run_id: &str,
    tags: &[String],
    now: f64,
) -> Result<(), StorageError> {
    conn.execute("DELETE FROM experiment_tags WHERE run_id = ?1", params![run_id])?;
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO experiment_tags (run_id, tag, created_at) VALUES (?1, ?2, ?3)",
    )?;
    for tag in tags {
        stmt.execute(params![run_id, tag, now])?;
    }
    Ok(())
}

pub fn tags_for_run(conn: &Connection, run_id: &str) -> Result<Vec<String>, StorageError> {
    let mut stmt = conn
        .prepare_cached("SELECT tag FROM experiment_tags WHERE run_id = ?1 ORDER BY tag")?;
    let tags = stmt
        .query_map(params![run_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(tags)
}

/// Record the sizes of a run's well-known files (hashes are filled in only
/// by `manage verify`, which has to read the bytes anyway).
pub fn record_files(
    conn: &Connection,
    run_id: &str,
    files: &[(&str, &std::path::Path)],
    now: f64,
) -> Result<(), StorageError> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO experiment_files (run_id, file_type, file_path, file_size, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5) \
         ON CONFLICT(run_id, file_type, file_path) DO UPDATE SET \
           file_size = excluded.file_size",
    )?;
    for (file_type, path) in files {
        let Ok(metadata) = std::fs::metadata(path) else {
            continue;
        };
        stmt.execute(params![
            run_id,
            file_type,
            path.to_string_lossy(),
            metadata.len() as i64,
            now,
        ])?;
    }
    Ok(())
}

/// Overwrite one run's best-metric columns (engine backfill for runs whose
/// writer never recorded a best).
pub fn update_best(
    conn: &Connection,
    run_id: &str,
    best: &rn_core::BestMetric,
) -> Result<(), StorageError> {
    conn.execute(
        "UPDATE experiments SET best_metric_name = ?1, best_metric_value = ?2, \
         best_metric_step = ?3, best_metric_mode = ?4 WHERE run_id = ?5",
        params![
            best.name,
            best.value,
            best.step,
            match best.mode {
                MetricMode::Max => "max",
                MetricMode::Min => "min",
            },
            run_id,
        ],
    )?;
    Ok(())
}

/// Stats per distinct path (from `v_path_stats`).
#[derive(Debug, Clone, Serialize)]
pub struct PathStat {
    pub path: String,
    pub run_count: i64,
    pub running_count: i64,
    pub last_created_at: Option<f64>,
}

pub fn path_stats(conn: &Connection) -> Result<Vec<PathStat>, StorageError> {
    let mut stmt = conn.prepare(
        "SELECT path, run_count, running_count, last_created_at \
         FROM v_path_stats ORDER BY path",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(PathStat {
                path: row.get(0)?,
                run_count: row.get(1)?,
                running_count: row.get(2)?,
                last_created_at: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
#[path = "experiments_tests.rs"]
mod tests;
