// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk contract models: `meta.json`, `status.json`, best-metric state
//!
//! These types mirror what the writer SDK puts on disk (spec'd by the SDK,
//! not by us), so deserialization is tolerant: unknown fields are ignored and
//! timestamps are accepted both as epoch seconds and as RFC 3339 strings.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
    Interrupted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Finished => "finished",
            RunStatus::Failed => "failed",
            RunStatus::Interrupted => "interrupted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(RunStatus::Running),
            "finished" => Some(RunStatus::Finished),
            "failed" => Some(RunStatus::Failed),
            "interrupted" => Some(RunStatus::Interrupted),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optimization direction for a primary metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricMode {
    Max,
    Min,
}

impl MetricMode {
    /// Whether `candidate` strictly improves on `current` under this mode.
    /// Ties do not improve, so the earlier step wins a tie.
    pub fn improves(&self, candidate: f64, current: f64) -> bool {
        match self {
            MetricMode::Max => candidate > current,
            MetricMode::Min => candidate < current,
        }
    }
}

/// A wall-clock timestamp that tolerates both wire forms.
///
/// The SDK has historically written epoch-second floats and RFC 3339 strings
/// in different versions; both deserialize here. Serialization always emits
/// RFC 3339 so our own outputs are uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    pub fn from_epoch_secs(secs: f64) -> Self {
        let ms = (secs * 1000.0) as i64;
        Self(
            Utc.timestamp_millis_opt(ms)
                .single()
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        )
    }

    pub fn epoch_secs(&self) -> f64 {
        self.0.timestamp_millis() as f64 / 1000.0
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl Serialize for Timestamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Epoch(f64),
            Text(String),
        }
        match Wire::deserialize(deserializer)? {
            Wire::Epoch(secs) => Ok(Timestamp::from_epoch_secs(secs)),
            Wire::Text(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| Timestamp(dt.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Best-value tracking for a run's primary metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestMetric {
    pub name: String,
    pub value: f64,
    pub step: i64,
    pub mode: MetricMode,
}

impl BestMetric {
    /// Fold one observation into the current best. Returns true if updated.
    ///
    /// NaN observations never update; ties keep the earlier step.
    pub fn observe(&mut self, value: f64, step: i64) -> bool {
        if value.is_nan() {
            return false;
        }
        if self.value.is_nan() || self.mode.improves(value, self.value) {
            self.value = value;
            self.step = step;
            return true;
        }
        false
    }
}

/// Primary-metric descriptor declared at run init or via an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryMetric {
    pub name: String,
    pub mode: MetricMode,
}

/// `meta.json`: written once by the SDK at run init.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: crate::RunId,
    /// Preserved verbatim when present; legacy `project`/`name` are only
    /// consulted when this is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<crate::RunPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_metric: Option<PrimaryMetric>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl RunMeta {
    /// The effective hierarchical label for this run.
    ///
    /// `path` wins when present; otherwise `<project>/<name>` is synthesized
    /// from the legacy pair. Runs carrying neither are unlabelable and land
    /// under `_unsorted`.
    pub fn effective_path(&self) -> crate::RunPath {
        if let Some(path) = &self.path {
            return path.clone();
        }
        if let (Some(project), Some(name)) = (&self.project, &self.name) {
            if let Ok(p) = crate::RunPath::from_legacy(project, name) {
                return p;
            }
        }
        // Unreachable parse failure: "_unsorted" is a valid path
        crate::RunPath::parse("_unsorted").unwrap_or_else(|_| unreachable!())
    }
}

/// `status.json`: rewritten by the SDK on heartbeat and transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusFile {
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,
    pub updated_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_metric: Option<BestMetric>,
}

/// Fold a `summary` event's `update` object into a summary snapshot.
///
/// Top-level keys are replaced; `null` removes a key. This is the "summary
/// is the fold of all summary events" reading of the contract.
pub fn fold_summary(
    snapshot: &mut HashMap<String, serde_json::Value>,
    update: &serde_json::Value,
) {
    if let Some(map) = update.as_object() {
        for (k, v) in map {
            if v.is_null() {
                snapshot.remove(k);
            } else {
                snapshot.insert(k.clone(), v.clone());
            }
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
