// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental `events.jsonl` parsing
//!
//! The file is append-only in normal operation, so parsing resumes from the
//! last consumed byte offset. Only complete lines (terminated by `\n`) are
//! consumed; a partial trailing line stays unconsumed until the writer
//! finishes it. Unparsable lines are counted and skipped.

use rn_core::status::PrimaryMetric;
use rn_core::Event;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

/// One metric observation, with its insertion order preserved for
/// tie-breaking in sorted query output.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub ts: f64,
    pub step: i64,
    /// Index into [`RunEvents::metric_names`].
    pub name_idx: usize,
    pub value: Option<f64>,
    pub stage: Option<String>,
    /// File order of this point within the run.
    pub seq: u64,
}

/// Accumulated parse state for one run's events file.
#[derive(Debug, Default, Clone)]
pub struct RunEvents {
    /// Byte offset up to which the file has been consumed (end of the last
    /// complete line).
    pub consumed: u64,
    /// Metric names in first-seen order.
    pub metric_names: Vec<String>,
    pub points: Vec<MetricPoint>,
    pub primary_metric: Option<PrimaryMetric>,
    /// Lines that failed to parse as JSON or as a known variant.
    pub parse_errors: u64,
    next_seq: u64,
}

impl RunEvents {
    pub fn name_index(&mut self, name: &str) -> usize {
        match self.metric_names.iter().position(|n| n == name) {
            Some(i) => i,
            None => {
                self.metric_names.push(name.to_string());
                self.metric_names.len() - 1
            }
        }
    }

    pub fn last_step(&self) -> Option<i64> {
        self.points.iter().map(|p| p.step).max()
    }

    fn apply(&mut self, event: Event) {
        match event {
            Event::Metric { ts, step, name, value, stage } => {
                let name_idx = self.name_index(&name);
                let seq = self.next_seq;
                self.next_seq += 1;
                // Non-finite values are unrepresentable in JSON; treat any
                // that sneak through as absent
                let value = value.filter(|v| v.is_finite());
                self.points.push(MetricPoint { ts, step, name_idx, value, stage, seq });
            }
            Event::PrimaryMetric { name, mode } => {
                self.primary_metric = Some(PrimaryMetric { name, mode });
            }
            // Logs, images, summaries, and statuses are served by other
            // read paths; the metric cache does not retain them
            _ => {}
        }
    }

    /// Parse the file tail starting at `self.consumed` and fold new events
    /// in. Returns the number of bytes newly consumed.
    pub fn extend_from_file(&mut self, path: &Path) -> std::io::Result<u64> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(self.consumed))?;

        let mut consumed_now = 0u64;
        let mut line = String::new();
        loop {
            line.clear();
            let n = reader.read_line(&mut line)?;
            if n == 0 {
                break;
            }
            if !line.ends_with('\n') {
                // Partial line: the writer has not finished it yet
                break;
            }
            consumed_now += n as u64;
            match Event::parse_line(line.trim_end()) {
                Ok(Some(event)) => self.apply(event),
                Ok(None) => {} // unknown type: ignored by contract
                Err(_) => self.parse_errors += 1,
            }
        }
        self.consumed += consumed_now;
        Ok(consumed_now)
    }

    /// Parse a whole file from scratch.
    pub fn parse_file(path: &Path) -> std::io::Result<Self> {
        let mut events = Self::default();
        events.extend_from_file(path)?;
        Ok(events)
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
