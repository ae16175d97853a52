// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `events.jsonl` line format
//!
//! Each line is one self-contained JSON object with a `type` discriminator.
//! Unknown discriminators are preserved as raw JSON rather than dropped, so
//! the debug events endpoint can pass them through untouched (forward
//! compatibility with newer SDKs).

use crate::status::{MetricMode, RunStatus};
use serde::{Deserialize, Serialize};

/// One parsed line of `events.jsonl`.
///
/// Serializes with `{"type": "<tag>", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A scalar observation for one metric at one step.
    Metric {
        ts: f64,
        step: i64,
        name: String,
        /// `null` for values the writer could not represent (NaN/Inf).
        #[serde(default)]
        value: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stage: Option<String>,
    },

    /// A captured console line (also appended raw to `logs.txt`).
    Log { ts: f64, text: String },

    /// An image artifact reference; `path` is relative to the run directory.
    Image {
        ts: f64,
        step: i64,
        key: String,
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },

    /// A partial update to the run's summary object.
    Summary { ts: f64, update: serde_json::Value },

    /// A status transition reported by the writer.
    Status {
        ts: f64,
        status: RunStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Designates the optimization target that drives best tracking.
    PrimaryMetric { name: String, mode: MetricMode },
}

impl Event {
    /// Parse one line. `Ok(None)` means a well-formed object with an unknown
    /// or missing `type` (ignored per contract but not an error); `Err` means
    /// the line is not valid JSON or has malformed known-variant fields.
    pub fn parse_line(line: &str) -> Result<Option<Event>, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(line)?;
        Self::from_value(value)
    }

    /// Interpret an already-parsed JSON object as an event.
    pub fn from_value(value: serde_json::Value) -> Result<Option<Event>, serde_json::Error> {
        match value.get("type").and_then(|t| t.as_str()) {
            Some("metric") | Some("log") | Some("image") | Some("summary") | Some("status")
            | Some("primary_metric") => serde_json::from_value(value).map(Some),
            _ => Ok(None),
        }
    }

    /// The event's wall-clock timestamp, if the variant carries one.
    pub fn ts(&self) -> Option<f64> {
        match self {
            Event::Metric { ts, .. }
            | Event::Log { ts, .. }
            | Event::Image { ts, .. }
            | Event::Summary { ts, .. }
            | Event::Status { ts, .. } => Some(*ts),
            Event::PrimaryMetric { .. } => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
