// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rn-engine: the metrics engine and run watcher
//!
//! Converts append-only `events.jsonl` files into fast query responses via
//! an incremental offset cache, and keeps the SQLite mirror warm with a
//! periodic reconciliation loop.

pub mod best;
pub mod cache;
pub mod events;
pub mod lttb;
pub mod series;
pub mod watcher;

pub use cache::{CacheStats, MetricsCache};
pub use events::{MetricPoint, RunEvents};
pub use series::{Axis, SeriesQuery, SeriesResponse};
pub use watcher::{run_watcher, WatcherConfig};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] rn_storage::StorageError),
}
