// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only access to one writer-owned run directory
//!
//! The Viewer never mutates these files. Readers are tolerant: a missing or
//! garbled file degrades the run's listing rather than failing the scan.

use crate::layout::{EVENTS_FILE, LOGS_FILE, MEDIA_DIR, META_FILE, STATUS_FILE, SUMMARY_FILE};
use crate::StorageError;
use rn_core::{Event, RunMeta, StatusFile};
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Handle to one run directory.
#[derive(Debug, Clone)]
pub struct RunDir {
    dir: PathBuf,
}

impl RunDir {
    pub fn new(dir: &Path) -> Self {
        Self { dir: dir.to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn events_path(&self) -> PathBuf {
        self.dir.join(EVENTS_FILE)
    }

    pub fn logs_path(&self) -> PathBuf {
        self.dir.join(LOGS_FILE)
    }

    pub fn media_dir(&self) -> PathBuf {
        self.dir.join(MEDIA_DIR)
    }

    pub fn assets_path(&self) -> PathBuf {
        self.dir.join(rn_archive::ASSETS_FILE_NAME)
    }

    /// Load `meta.json`. Required: a directory without readable meta is not
    /// a run.
    pub fn meta(&self) -> Result<RunMeta, StorageError> {
        let path = self.dir.join(META_FILE);
        let text = std::fs::read_to_string(&path)?;
        serde_json::from_str(&text).map_err(|source| StorageError::Json { path, source })
    }

    /// Load `status.json`; `None` when absent or unreadable (a freshly
    /// initialized run may not have written it yet).
    pub fn status(&self) -> Option<StatusFile> {
        let text = std::fs::read_to_string(self.dir.join(STATUS_FILE)).ok()?;
        serde_json::from_str(&text).ok()
    }

    /// Load `summary.json`; empty when absent.
    pub fn summary_file(&self) -> HashMap<String, serde_json::Value> {
        std::fs::read_to_string(self.dir.join(SUMMARY_FILE))
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default()
    }

    /// The run's effective summary: `summary.json` with every `summary`
    /// event folded on top, in file order.
    pub fn folded_summary(&self) -> HashMap<String, serde_json::Value> {
        let mut snapshot = self.summary_file();
        self.for_each_event(|event| {
            if let Event::Summary { update, .. } = event {
                rn_core::status::fold_summary(&mut snapshot, &update);
            }
        });
        snapshot
    }

    /// Count `type="metric"` lines in `events.jsonl`.
    pub fn metric_count(&self) -> usize {
        let mut count = 0;
        self.for_each_event(|event| {
            if matches!(event, Event::Metric { .. }) {
                count += 1;
            }
        });
        count
    }

    /// Number of registered assets, 0 when no manifest exists.
    pub fn asset_count(&self) -> usize {
        rn_archive::AssetManifest::load(&self.assets_path())
            .map(|m| m.assets.len())
            .unwrap_or(0)
    }

    /// Stream well-formed events to `f`, skipping unparsable and partial
    /// lines. Suited to full-file folds; the incremental metric path lives
    /// in the engine crate.
    fn for_each_event(&self, mut f: impl FnMut(Event)) {
        let file = match std::fs::File::open(self.events_path()) {
            Ok(f) => f,
            Err(_) => return,
        };
        let mut reader = BufReader::new(file);
        let mut line = String::new();
        loop {
            line.clear();
            let n = match reader.read_line(&mut line) {
                Ok(n) => n,
                Err(_) => return,
            };
            if n == 0 {
                return;
            }
            if !line.ends_with('\n') {
                // Partial trailing line: the writer is mid-append
                return;
            }
            if let Ok(Some(event)) = Event::parse_line(line.trim_end()) {
                f(event);
            }
        }
    }
}

#[cfg(test)]
#[path = "rundir_tests.rs"]
mod tests;
