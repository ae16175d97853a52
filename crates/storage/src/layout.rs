// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage-root layout
//!
//! ```text
//! <storage_root>/
//!   runicorn.db            SQLite mirror
//!   archive/               blob store
//!   recycle_bin/           tombstones for soft-deleted runs
//!   <path...>/<run_id>/    run directories, mirroring RunPath
//! ```

use rn_core::{RunId, RunPath};
use std::path::{Path, PathBuf};

pub const DB_FILE: &str = "runicorn.db";
pub const ARCHIVE_DIR: &str = "archive";
pub const RECYCLE_DIR: &str = "recycle_bin";

pub const META_FILE: &str = "meta.json";
pub const STATUS_FILE: &str = "status.json";
pub const SUMMARY_FILE: &str = "summary.json";
pub const EVENTS_FILE: &str = "events.jsonl";
pub const LOGS_FILE: &str = "logs.txt";
pub const MEDIA_DIR: &str = "media";

/// A discovered run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLocation {
    pub run_id: RunId,
    pub path: RunPath,
    pub dir: PathBuf,
}

/// Path arithmetic for one storage root.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: &Path) -> Self {
        Self { root: root.to_path_buf() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(DB_FILE)
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join(ARCHIVE_DIR)
    }

    pub fn recycle_dir(&self) -> PathBuf {
        self.root.join(RECYCLE_DIR)
    }

    pub fn run_dir(&self, path: &RunPath, run_id: &RunId) -> PathBuf {
        path.join_under(&self.root).join(run_id.as_str())
    }

    /// Walk the storage root and return every directory that looks like a
    /// run: its name parses as a run ID and it contains `meta.json`.
    ///
    /// The mirror's own directories (`archive/`, `recycle_bin/`) are
    /// pruned from the walk.
    pub fn discover_runs(&self) -> Vec<RunLocation> {
        let mut found = Vec::new();
        let walker = walkdir::WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                !(e.depth() == 1 && (name == ARCHIVE_DIR || name == RECYCLE_DIR))
            });

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            let run_id = match RunId::parse(&name) {
                Ok(id) => id,
                Err(_) => continue,
            };
            if !entry.path().join(META_FILE).is_file() {
                continue;
            }
            let Some(path) = self.label_for(entry.path()) else {
                continue;
            };
            found.push(RunLocation { run_id, path, dir: entry.path().to_path_buf() });
        }
        found.sort_by(|a, b| a.run_id.cmp(&b.run_id));
        found
    }

    /// Derive the run's hierarchical label from its position under the root.
    fn label_for(&self, run_dir: &Path) -> Option<RunPath> {
        let parent = run_dir.parent()?;
        let rel = parent.strip_prefix(&self.root).ok()?;
        let label = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        RunPath::parse(&label).ok()
    }

    /// Locate a single run by ID anywhere under the root.
    pub fn find_run(&self, run_id: &RunId) -> Option<RunLocation> {
        self.discover_runs().into_iter().find(|r| &r.run_id == run_id)
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
