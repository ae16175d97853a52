// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recycle bin
//!
//! Soft deletion moves nothing on disk: the run keeps its directory, the
//! mirror row gets `deleted_at`, and a tombstone lands in `recycle_bin/`.
//! Emptying the bin is the only operation that actually deletes run
//! directories, followed by a blob-GC sweep against the fresh live set.

use crate::db::{experiments, pool::DbPool};
use crate::layout::StorageLayout;
use crate::StorageError;
use rn_archive::{scan_live_digests, BlobStore, GcReport};
use rn_core::Clock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// One tombstone in `recycle_bin/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecycleEntry {
    pub run_id: String,
    pub path: String,
    pub run_dir: PathBuf,
    /// Epoch seconds of the soft delete.
    pub deleted_at: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Result of emptying (part of) the bin.
#[derive(Debug, Default)]
pub struct EmptyReport {
    pub removed_runs: usize,
    pub gc: GcReport,
}

pub struct RecycleBin {
    layout: StorageLayout,
    pool: DbPool,
}

impl RecycleBin {
    pub fn new(layout: StorageLayout, pool: DbPool) -> Self {
        Self { layout, pool }
    }

    fn tombstone_path(&self, run_id: &str) -> PathBuf {
        self.layout.recycle_dir().join(format!("{}.json", run_id))
    }

    /// Soft-delete runs: set `deleted_at` in the mirror and drop a tombstone
    /// per run. Unknown IDs are skipped (delete is idempotent).
    pub fn soft_delete(
        &self,
        run_ids: &[String],
        reason: Option<&str>,
        clock: &impl Clock,
    ) -> Result<usize, StorageError> {
        let now = clock.epoch_secs();
        let owned: Vec<String> = run_ids.to_vec();
        let changed = self.pool.with_write(|db| {
            experiments::soft_delete(db.conn(), &owned, reason, now)
        })?;

        std::fs::create_dir_all(self.layout.recycle_dir())?;
        for run_id in run_ids {
            let Some(row) = self.pool.with_read(|conn| experiments::get(conn, run_id))? else {
                continue;
            };
            if row.deleted_at.is_none() {
                continue;
            }
            let entry = RecycleEntry {
                run_id: row.run_id.clone(),
                path: row.path.clone(),
                run_dir: PathBuf::from(&row.run_dir),
                deleted_at: row.deleted_at.unwrap_or(now),
                reason: reason.map(str::to_string),
            };
            self.write_tombstone(&entry)?;
        }
        info!(count = changed, "soft-deleted runs");
        Ok(changed)
    }

    fn write_tombstone(&self, entry: &RecycleEntry) -> Result<(), StorageError> {
        let target = self.tombstone_path(&entry.run_id);
        let tmp = target.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entry).map_err(io_other)?)?;
        std::fs::rename(&tmp, &target)?;
        Ok(())
    }

    /// All current tombstones, oldest first.
    pub fn list(&self) -> Result<Vec<RecycleEntry>, StorageError> {
        let dir = self.layout.recycle_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for item in std::fs::read_dir(&dir)? {
            let item = item?;
            if item.path().extension().is_none_or(|e| e != "json") {
                continue;
            }
            match std::fs::read_to_string(item.path())
                .map_err(StorageError::Io)
                .and_then(|text| {
                    serde_json::from_str(&text)
                        .map_err(|source| StorageError::Json { path: item.path(), source })
                }) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(path = %item.path().display(), error = %e,
                    "skipping unreadable tombstone"),
            }
        }
        entries.sort_by(|a: &RecycleEntry, b: &RecycleEntry| {
            a.deleted_at.total_cmp(&b.deleted_at)
        });
        Ok(entries)
    }

    /// Restore soft-deleted runs: clear `deleted_at`, remove tombstones.
    /// Run files were never touched, so restore is purely bookkeeping.
    pub fn restore(&self, run_ids: &[String]) -> Result<usize, StorageError> {
        let owned: Vec<String> = run_ids.to_vec();
        let changed =
            self.pool.with_write(|db| experiments::restore(db.conn(), &owned))?;
        for run_id in run_ids {
            let _ = std::fs::remove_file(self.tombstone_path(run_id));
        }
        info!(count = changed, "restored runs from recycle bin");
        Ok(changed)
    }

    /// Permanently delete every tombstoned run, then GC the blob store
    /// against the manifests that remain.
    pub fn empty(&self, store: &BlobStore) -> Result<EmptyReport, StorageError> {
        let entries = self.list()?;
        self.purge_entries(&entries, store)
    }

    /// Permanently delete a specific set of tombstoned runs.
    pub fn purge_runs(
        &self,
        run_ids: &[String],
        store: &BlobStore,
    ) -> Result<EmptyReport, StorageError> {
        let selected: Vec<RecycleEntry> = self
            .list()?
            .into_iter()
            .filter(|e| run_ids.iter().any(|id| id == &e.run_id))
            .collect();
        if selected.is_empty() {
            return Ok(EmptyReport::default());
        }
        self.purge_entries(&selected, store)
    }

    /// Delete only tombstones older than the retention window.
    pub fn purge_expired(
        &self,
        store: &BlobStore,
        retention_days: u64,
        clock: &impl Clock,
    ) -> Result<EmptyReport, StorageError> {
        let cutoff = clock.epoch_secs() - (retention_days * 86_400) as f64;
        let expired: Vec<RecycleEntry> = self
            .list()?
            .into_iter()
            .filter(|e| e.deleted_at < cutoff)
            .collect();
        if expired.is_empty() {
            return Ok(EmptyReport::default());
        }
        self.purge_entries(&expired, store)
    }

    fn purge_entries(
        &self,
        entries: &[RecycleEntry],
        store: &BlobStore,
    ) -> Result<EmptyReport, StorageError> {
        let mut report = EmptyReport::default();
        for entry in entries {
            // Guard: only ever remove directories under our own root
            if entry.run_dir.starts_with(self.layout.root()) && entry.run_dir.is_dir() {
                std::fs::remove_dir_all(&entry.run_dir)?;
            }
            self.pool.with_write(|db| experiments::delete_row(db.conn(), &entry.run_id))?;
            let _ = std::fs::remove_file(self.tombstone_path(&entry.run_id));
            report.removed_runs += 1;
            info!(run_id = %entry.run_id, "permanently deleted run");
        }

        // Manifests are gone with their directories; rebuild the live set
        let live = scan_live_digests(self.layout.root())?;
        report.gc = store.gc(&live)?;
        Ok(report)
    }
}

fn io_other(e: serde_json::Error) -> StorageError {
    StorageError::Io(std::io::Error::other(e))
}

#[cfg(test)]
#[path = "recycle_tests.rs"]
mod tests;
