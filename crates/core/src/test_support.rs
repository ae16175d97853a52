// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{Event, MetricMode, RunId, RunPath, RunStatus};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Builder that materializes a writer-SDK-shaped run directory for tests.
///
/// Produces `meta.json`, `status.json`, and `events.jsonl` under
/// `<root>/<path>/<run_id>/`, mirroring what the Python SDK writes.
pub struct RunDirBuilder {
    run_id: RunId,
    path: RunPath,
    created_at: f64,
    status: RunStatus,
    updated_at: f64,
    events: Vec<String>,
    pid: Option<u32>,
    hostname: Option<String>,
    primary_metric: Option<(String, MetricMode)>,
}

impl RunDirBuilder {
    pub fn new(run_id: &str, path: &str) -> Self {
        #[allow(clippy::unwrap_used)]
        Self {
            run_id: RunId::parse(run_id).unwrap(),
            path: RunPath::parse(path).unwrap(),
            created_at: 1_704_067_200.0,
            status: RunStatus::Running,
            updated_at: 1_704_067_200.0,
            events: Vec::new(),
            pid: Some(4242),
            hostname: Some("testhost".to_string()),
            primary_metric: None,
        }
    }

    pub fn status(mut self, status: RunStatus) -> Self {
        self.status = status;
        self
    }

    pub fn updated_at(mut self, epoch_secs: f64) -> Self {
        self.updated_at = epoch_secs;
        self
    }

    pub fn pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    pub fn hostname(mut self, hostname: &str) -> Self {
        self.hostname = Some(hostname.to_string());
        self
    }

    pub fn primary_metric(mut self, name: &str, mode: MetricMode) -> Self {
        self.primary_metric = Some((name.to_string(), mode));
        self
    }

    pub fn event(mut self, event: &Event) -> Self {
        #[allow(clippy::unwrap_used)]
        self.events.push(serde_json::to_string(event).unwrap());
        self
    }

    pub fn raw_event_line(mut self, line: &str) -> Self {
        self.events.push(line.to_string());
        self
    }

    pub fn metric(self, ts: f64, step: i64, name: &str, value: f64) -> Self {
        self.event(&Event::Metric {
            ts,
            step,
            name: name.to_string(),
            value: Some(value),
            stage: None,
        })
    }

    /// Write the run directory under `root`, returning its path.
    #[allow(clippy::unwrap_used)]
    pub fn write(self, root: &Path) -> PathBuf {
        let run_dir = self.path.join_under(root).join(self.run_id.as_str());
        fs::create_dir_all(&run_dir).unwrap();

        let mut meta = serde_json::json!({
            "run_id": self.run_id.as_str(),
            "path": self.path.as_str(),
            "created_at": self.created_at,
            "python_version": "3.11.8",
            "platform": "linux",
        });
        if let Some(pid) = self.pid {
            meta["pid"] = serde_json::json!(pid);
        }
        if let Some(hostname) = &self.hostname {
            meta["hostname"] = serde_json::json!(hostname);
        }
        if let Some((name, mode)) = &self.primary_metric {
            meta["primary_metric"] = serde_json::json!({ "name": name, "mode": mode });
        }
        fs::write(run_dir.join("meta.json"), serde_json::to_vec_pretty(&meta).unwrap())
            .unwrap();

        let status = serde_json::json!({
            "status": self.status.as_str(),
            "started_at": self.created_at,
            "updated_at": self.updated_at,
        });
        fs::write(run_dir.join("status.json"), serde_json::to_vec_pretty(&status).unwrap())
            .unwrap();

        let mut events = fs::File::create(run_dir.join("events.jsonl")).unwrap();
        for line in &self.events {
            writeln!(events, "{}", line).unwrap();
        }

        run_dir
    }
}
