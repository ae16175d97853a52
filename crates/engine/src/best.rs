// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-metric folding
//!
//! The writer SDK maintains `status.json.best_metric` itself; the engine
//! re-derives the same fold from the event stream so the mirror stays
//! correct even when the writer died before its last heartbeat.

use crate::events::RunEvents;
use rn_core::status::PrimaryMetric;
use rn_core::BestMetric;

/// Fold the run's primary metric to its best observation.
///
/// The primary metric comes from the event stream when declared there,
/// falling back to `meta.json`'s descriptor (passed by the caller). Ties
/// keep the earlier step; NaN and null observations never win.
pub fn fold_best(
    events: &RunEvents,
    meta_primary: Option<&PrimaryMetric>,
) -> Option<BestMetric> {
    let primary = events.primary_metric.as_ref().or(meta_primary)?;
    let name_idx = events.metric_names.iter().position(|n| n == &primary.name)?;

    let mut best: Option<BestMetric> = None;
    for point in events.points.iter().filter(|p| p.name_idx == name_idx) {
        let Some(value) = point.value else {
            continue;
        };
        match &mut best {
            None => {
                best = Some(BestMetric {
                    name: primary.name.clone(),
                    value,
                    step: point.step,
                    mode: primary.mode,
                });
            }
            Some(best) => {
                best.observe(value, point.step);
            }
        }
    }
    best
}

#[cfg(test)]
#[path = "best_tests.rs"]
mod tests;
