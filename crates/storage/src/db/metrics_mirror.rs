// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mirroring metric rows into SQLite
//!
//! The JSONL file remains the canonical series source; this table exists
//! for aggregates and cross-run queries. Rows are keyed
//! `(run_id, timestamp, metric_name)` per contract, so duplicate appends
//! collapse on conflict.

use crate::StorageError;
use rusqlite::{params, Connection};

/// One metric observation to mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub timestamp: f64,
    pub metric_name: String,
    pub value: Option<f64>,
    pub step: i64,
    pub stage: Option<String>,
}

/// Batch size per transaction during reconciliation.
pub const BATCH_SIZE: usize = 500;

/// Upsert a run's metric rows in batches.
pub fn upsert_metrics(
    conn: &Connection,
    run_id: &str,
    rows: &[MetricRow],
    recorded_at: f64,
) -> Result<usize, StorageError> {
    let mut written = 0;
    for chunk in rows.chunks(BATCH_SIZE) {
        conn.execute_batch("BEGIN")?;
        let result = (|| -> Result<(), StorageError> {
            let mut stmt = conn.prepare_cached(
                "INSERT INTO metrics (run_id, timestamp, metric_name, value, step, stage, \
                 recorded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
                 ON CONFLICT(run_id, timestamp, metric_name) DO UPDATE SET \
                   value = excluded.value, step = excluded.step, stage = excluded.stage",
            )?;
            for row in chunk {
                stmt.execute(params![
                    run_id,
                    row.timestamp,
                    row.metric_name,
                    row.value,
                    row.step,
                    row.stage,
                    recorded_at,
                ])?;
            }
            Ok(())
        })();
        match result {
            Ok(()) => {
                conn.execute_batch("COMMIT")?;
                written += chunk.len();
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(e);
            }
        }
    }
    Ok(written)
}

/// Number of mirrored points for one run.
pub fn count_for_run(conn: &Connection, run_id: &str) -> Result<i64, StorageError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM metrics WHERE run_id = ?1",
        params![run_id],
        |row| row.get(0),
    )?)
}

/// Distinct metric names seen for one run, sorted.
pub fn metric_names(conn: &Connection, run_id: &str) -> Result<Vec<String>, StorageError> {
    let mut stmt = conn.prepare_cached(
        "SELECT DISTINCT metric_name FROM metrics WHERE run_id = ?1 ORDER BY metric_name",
    )?;
    let names = stmt
        .query_map(params![run_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

#[cfg(test)]
#[path = "metrics_mirror_tests.rs"]
mod tests;
