// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The SQLite mirror
//!
//! `runicorn.db` is a cache over the filesystem: every row is rebuildable
//! from `meta.json`/`status.json`, so corruption is handled by moving the
//! file aside and reindexing rather than by repair. WAL mode, one writer
//! connection, a small pool of readers.

pub mod experiments;
pub mod metrics_mirror;
pub mod pool;

use crate::StorageError;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

/// Timestamps are stored as REAL epoch seconds throughout the mirror, so
/// freshness comparisons stay arithmetic on both sides of the SQL boundary.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS experiments (
    run_id            TEXT PRIMARY KEY,
    path              TEXT NOT NULL,
    alias             TEXT,
    created_at        REAL NOT NULL,
    updated_at        REAL,
    started_at        REAL,
    ended_at          REAL,
    status            TEXT NOT NULL DEFAULT 'running',
    pid               INTEGER,
    hostname          TEXT,
    python_version    TEXT,
    platform          TEXT,
    best_metric_name  TEXT,
    best_metric_value REAL,
    best_metric_step  INTEGER,
    best_metric_mode  TEXT,
    deleted_at        REAL,
    delete_reason     TEXT,
    run_dir           TEXT NOT NULL,
    duration_seconds  REAL,
    metric_count      INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS metrics (
    run_id      TEXT NOT NULL,
    timestamp   REAL NOT NULL,
    metric_name TEXT NOT NULL,
    value       REAL,
    step        INTEGER,
    stage       TEXT,
    recorded_at REAL,
    PRIMARY KEY (run_id, timestamp, metric_name)
);

CREATE TABLE IF NOT EXISTS experiment_tags (
    run_id     TEXT NOT NULL,
    tag        TEXT NOT NULL,
    created_at REAL,
    PRIMARY KEY (run_id, tag)
);

CREATE TABLE IF NOT EXISTS environments (
    run_id            TEXT PRIMARY KEY,
    git_commit        TEXT,
    git_branch        TEXT,
    git_dirty         INTEGER,
    python_version    TEXT,
    python_executable TEXT,
    conda_env         TEXT,
    conda_version     TEXT,
    cpu_count         INTEGER,
    memory_total_gb   REAL,
    gpu_info          TEXT,
    env_variables     TEXT,
    captured_at       REAL
);

CREATE TABLE IF NOT EXISTS experiment_files (
    run_id     TEXT NOT NULL,
    file_type  TEXT NOT NULL,
    file_path  TEXT NOT NULL,
    file_size  INTEGER,
    file_hash  TEXT,
    created_at REAL,
    PRIMARY KEY (run_id, file_type, file_path)
);

CREATE INDEX IF NOT EXISTS idx_experiments_path    ON experiments(path);
CREATE INDEX IF NOT EXISTS idx_experiments_alias   ON experiments(alias);
CREATE INDEX IF NOT EXISTS idx_experiments_status  ON experiments(status);
CREATE INDEX IF NOT EXISTS idx_experiments_created ON experiments(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_experiments_best
    ON experiments(best_metric_name, best_metric_value DESC);
CREATE INDEX IF NOT EXISTS idx_experiments_deleted ON experiments(deleted_at);
CREATE INDEX IF NOT EXISTS idx_experiments_live
    ON experiments(status, deleted_at) WHERE deleted_at IS NULL;

CREATE VIEW IF NOT EXISTS v_path_stats AS
    SELECT path,
           COUNT(*) AS run_count,
           SUM(CASE WHEN status = 'running' THEN 1 ELSE 0 END) AS running_count,
           MAX(created_at) AS last_created_at
    FROM experiments
    WHERE deleted_at IS NULL
    GROUP BY path;

CREATE VIEW IF NOT EXISTS v_best_experiments AS
    SELECT *,
           RANK() OVER (
               PARTITION BY path, best_metric_name
               ORDER BY CASE WHEN best_metric_mode = 'min'
                             THEN best_metric_value
                             ELSE -best_metric_value END
           ) AS best_rank
    FROM experiments
    WHERE deleted_at IS NULL AND best_metric_value IS NOT NULL;

CREATE VIEW IF NOT EXISTS v_recent_activity AS
    SELECT run_id, path, status, updated_at,
           CASE
               WHEN updated_at >= strftime('%s', 'now') - 3600 THEN 'hour'
               WHEN updated_at >= strftime('%s', 'now') - 86400 THEN 'day'
               WHEN updated_at >= strftime('%s', 'now') - 604800 THEN 'week'
               ELSE 'older'
           END AS recency
    FROM experiments
    WHERE deleted_at IS NULL;
"#;

/// One open mirror database.
pub struct Db {
    conn: Connection,
}

impl Db {
    /// Open the mirror, surviving corruption.
    ///
    /// A database that fails to open or fails `integrity_check` is renamed
    /// to `runicorn.db.corrupt.<epoch>` and a fresh one is created; the next
    /// reconciliation repopulates it from the filesystem.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        match Self::try_open(path) {
            Ok(db) => Ok(db),
            Err(first_err) => {
                let stamp = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                let aside = path.with_extension(format!("db.corrupt.{}", stamp));
                error!(
                    db = %path.display(),
                    moved_to = %aside.display(),
                    error = %first_err,
                    "mirror database corrupt, rebuilding"
                );
                let _ = std::fs::rename(path, &aside);
                // WAL sidecars belong to the corrupt generation
                let _ = std::fs::remove_file(path.with_extension("db-wal"));
                let _ = std::fs::remove_file(path.with_extension("db-shm"));
                Self::try_open(path)
            }
        }
    }

    fn try_open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        apply_pragmas(&conn)?;
        let ok: String =
            conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if ok != "ok" {
            return Err(StorageError::Sqlite(rusqlite::Error::InvalidQuery));
        }
        conn.execute_batch(SCHEMA)?;
        info!(db = %path.display(), "mirror database open");
        Ok(Self { conn })
    }

    /// In-memory database for tests and ephemeral tooling.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Run `f` inside a savepoint: committed on `Ok`, rolled back on `Err`.
    pub fn with_savepoint<T>(
        &mut self,
        f: impl FnOnce(&rusqlite::Savepoint<'_>) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let sp = self.conn.savepoint()?;
        let out = f(&sp)?;
        sp.commit()?;
        Ok(out)
    }
}

fn apply_pragmas(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "memory")?;
    // Negative cache_size is KiB: 10 MiB page cache
    conn.pragma_update(None, "cache_size", -10_240)?;
    conn.pragma_update(None, "mmap_size", 268_435_456)?;
    conn.busy_timeout(Duration::from_millis(250))?;
    Ok(())
}

/// Retry `f` on SQLITE_BUSY with exponential backoff: 5 attempts, ≤ 2 s of
/// sleep in total.
pub fn retry_busy<T>(mut f: impl FnMut() -> Result<T, StorageError>) -> Result<T, StorageError> {
    let mut delay = Duration::from_millis(50);
    for attempt in 0..5 {
        match f() {
            Err(StorageError::Sqlite(e)) if is_busy(&e) && attempt < 4 => {
                std::thread::sleep(delay);
                delay *= 2;
            }
            other => return other,
        }
    }
    Err(StorageError::Busy)
}

fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
    )
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
