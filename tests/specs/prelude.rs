// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared spec fixtures.

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// One isolated CLI environment: private HOME, config dir, and storage.
pub struct Env {
    pub home: TempDir,
    pub storage: TempDir,
}

impl Env {
    pub fn new() -> Self {
        Self {
            home: TempDir::new().expect("temp home"),
            storage: TempDir::new().expect("temp storage"),
        }
    }

    /// A `runicorn` command pointed at this environment.
    pub fn runicorn(&self) -> Command {
        let mut cmd = Command::cargo_bin("runicorn").expect("binary built");
        cmd.env("HOME", self.home.path())
            .env("XDG_CONFIG_HOME", self.home.path().join(".config"))
            .env("XDG_DATA_HOME", self.home.path().join(".local/share"))
            .env_remove("RUNICORN_STORAGE")
            .env_remove("RUNICORN_HOST")
            .env_remove("RUNICORN_PORT")
            .env_remove("RUNICORN_LOG")
            .arg("--storage")
            .arg(self.storage.path());
        cmd
    }

    /// Seed a writer-shaped run directory under the storage root.
    pub fn seed_run(&self, path: &str, run_id: &str, metric_lines: &[(f64, i64, f64)]) -> PathBuf {
        let run_dir = self.storage.path().join(path).join(run_id);
        std::fs::create_dir_all(&run_dir).expect("run dir");

        write_json(
            &run_dir.join("meta.json"),
            &serde_json::json!({
                "run_id": run_id,
                "path": path,
                "created_at": 1_704_067_200.0,
                "python_version": "3.11.8",
                "platform": "linux",
                "pid": 4242,
                "hostname": "spec-host",
            }),
        );
        write_json(
            &run_dir.join("status.json"),
            &serde_json::json!({
                "status": "finished",
                "started_at": 1_704_067_200.0,
                "ended_at": 1_704_067_500.0,
                "updated_at": 1_704_067_500.0,
            }),
        );

        let mut events = String::new();
        for (ts, step, value) in metric_lines {
            events.push_str(&format!(
                "{}\n",
                serde_json::json!({
                    "type": "metric", "ts": ts, "step": step, "name": "loss", "value": value
                })
            ));
        }
        std::fs::write(run_dir.join("events.jsonl"), events).expect("events");
        run_dir
    }
}

fn write_json(path: &Path, value: &serde_json::Value) {
    std::fs::write(path, serde_json::to_vec_pretty(value).expect("json")).expect("write");
}
