// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metric query assembly
//!
//! Turns cached parse state into the wire shape of the metrics endpoints:
//! rows sorted by the requested axis, one column per requested key, with
//! optional per-series LTTB downsampling. Rows are the sorted union of all
//! preserved x-values; series absent at an x contribute null.

use crate::events::{MetricPoint, RunEvents};
use crate::lttb::lttb_indices;
use serde::Serialize;
use std::collections::BTreeMap;

/// Which column drives ordering and downsampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Axis {
    #[default]
    Timestamp,
    Step,
}

#[derive(Debug, Clone, Default)]
pub struct SeriesQuery {
    /// Requested metric names; `None` means every metric seen in the run.
    pub keys: Option<Vec<String>>,
    /// Per-series point budget; `None` disables downsampling.
    pub downsample: Option<usize>,
    pub axis: Axis,
}

/// One output row: the two axis columns plus a value per requested key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRow {
    pub timestamp: f64,
    pub step: i64,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesResponse {
    /// `["timestamp", "step"] + keys`.
    pub columns: Vec<String>,
    pub rows: Vec<SeriesRow>,
    /// Union row count before downsampling.
    pub total: usize,
    /// True when any series was reduced.
    pub sampled: bool,
    pub last_step: Option<i64>,
}

/// Total-ordered f64 wrapper so timestamps can key a BTreeMap.
#[derive(Debug, Clone, Copy, PartialEq)]
struct F64Ord(f64);

impl Eq for F64Ord {}

impl PartialOrd for F64Ord {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for F64Ord {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum RowKey {
    Ts(F64Ord),
    Step(i64),
}

fn row_key(axis: Axis, point: &MetricPoint) -> RowKey {
    match axis {
        Axis::Timestamp => RowKey::Ts(F64Ord(point.ts)),
        Axis::Step => RowKey::Step(point.step),
    }
}

/// Build the response for one run.
pub fn build_series(events: &RunEvents, query: &SeriesQuery) -> SeriesResponse {
    let keys: Vec<String> = match &query.keys {
        Some(keys) => keys.clone(),
        None => events.metric_names.clone(),
    };

    // Per requested key: that series' points sorted by axis, ties by file
    // order
    let mut series: Vec<Vec<&MetricPoint>> = keys
        .iter()
        .map(|key| {
            let idx = events.metric_names.iter().position(|n| n == key);
            let mut points: Vec<&MetricPoint> = match idx {
                Some(idx) => {
                    events.points.iter().filter(|p| p.name_idx == idx).collect()
                }
                None => Vec::new(),
            };
            points.sort_by(|a, b| match query.axis {
                Axis::Timestamp => {
                    a.ts.total_cmp(&b.ts).then_with(|| a.seq.cmp(&b.seq))
                }
                Axis::Step => a
                    .step
                    .cmp(&b.step)
                    .then_with(|| a.ts.total_cmp(&b.ts))
                    .then_with(|| a.seq.cmp(&b.seq)),
            });
            points
        })
        .collect();

    // Pre-downsample union for X-Total-Count
    let total = {
        let mut union: BTreeMap<RowKey, ()> = BTreeMap::new();
        for points in &series {
            for p in points {
                union.insert(row_key(query.axis, p), ());
            }
        }
        union.len()
    };

    // Per-series LTTB over non-null points; first and last always survive
    let mut sampled = false;
    if let Some(budget) = query.downsample {
        for points in series.iter_mut() {
            let finite: Vec<&MetricPoint> =
                points.iter().copied().filter(|p| p.value.is_some()).collect();
            if finite.len() > budget {
                let xy: Vec<(f64, f64)> = finite
                    .iter()
                    .map(|p| {
                        let x = match query.axis {
                            Axis::Timestamp => p.ts,
                            Axis::Step => p.step as f64,
                        };
                        (x, p.value.unwrap_or_default())
                    })
                    .collect();
                let kept = lttb_indices(&xy, budget);
                *points = kept.into_iter().map(|i| finite[i]).collect();
                sampled = true;
            }
        }
    }

    // Merge preserved points into the sorted row union
    let mut rows: BTreeMap<RowKey, SeriesRow> = BTreeMap::new();
    for (series_idx, points) in series.iter().enumerate() {
        for point in points {
            let row = rows.entry(row_key(query.axis, point)).or_insert_with(|| SeriesRow {
                timestamp: point.ts,
                step: point.step,
                values: vec![None; keys.len()],
            });
            // First contributor in file order wins a duplicate x
            if row.values[series_idx].is_none() {
                row.values[series_idx] = point.value;
            }
        }
    }

    let mut columns = vec!["timestamp".to_string(), "step".to_string()];
    columns.extend(keys);

    SeriesResponse {
        columns,
        rows: rows.into_values().collect(),
        total,
        sampled,
        last_step: events.last_step(),
    }
}

#[cfg(test)]
#[path = "series_tests.rs"]
mod tests;
