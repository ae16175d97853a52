// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental metric cache
//!
//! Per-run parse state keyed by run ID, validated against the events file's
//! current size on every access: growth triggers a tail-only parse, shrink
//! (truncate/rewrite) invalidates the entry. A stale entry can never serve
//! a truncated file because the consumed size is part of the entry and is
//! re-checked against the filesystem before use.

use crate::events::RunEvents;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Default maximum number of cached runs.
pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Default, Serialize, PartialEq, Clone)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub incremental_updates: u64,
    pub hit_rate: f64,
}

struct Entry {
    events: Arc<RunEvents>,
    /// File size observed when the entry was last refreshed.
    file_size: u64,
    last_used: u64,
}

struct Inner {
    entries: HashMap<String, Entry>,
    use_counter: u64,
}

/// Process-wide metric cache. One per Viewer; see the singleton policy in
/// the server crate.
pub struct MetricsCache {
    inner: Mutex<Inner>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    incremental_updates: AtomicU64,
}

impl MetricsCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner { entries: HashMap::new(), use_counter: 0 }),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            incremental_updates: AtomicU64::new(0),
        }
    }

    /// Parsed events for `run_id`, refreshed against `events_path`.
    ///
    /// A missing file yields an empty (and uncached) result so a
    /// just-initialized run queries cleanly.
    pub fn get(&self, run_id: &str, events_path: &Path) -> std::io::Result<Arc<RunEvents>> {
        let file_size = match std::fs::metadata(events_path) {
            Ok(m) => m.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Arc::new(RunEvents::default()));
            }
            Err(e) => return Err(e),
        };

        let mut inner = self.inner.lock();
        inner.use_counter += 1;
        let stamp = inner.use_counter;

        if let Some(entry) = inner.entries.get_mut(run_id) {
            if file_size == entry.file_size {
                entry.last_used = stamp;
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(&entry.events));
            }
            if file_size > entry.file_size {
                // Grown: parse only the appended tail
                let mut events = (*entry.events).clone();
                events.extend_from_file(events_path)?;
                let shared = Arc::new(events);
                entry.events = Arc::clone(&shared);
                entry.file_size = file_size;
                entry.last_used = stamp;
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.incremental_updates.fetch_add(1, Ordering::Relaxed);
                return Ok(shared);
            }
            // Shrunk: the file was truncated or rewritten; drop the entry
            debug!(run_id, "events file shrank, invalidating cache entry");
            inner.entries.remove(run_id);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let events = Arc::new(RunEvents::parse_file(events_path)?);
        if inner.entries.len() >= self.capacity {
            evict_lru(&mut inner);
        }
        inner.entries.insert(
            run_id.to_string(),
            Entry { events: Arc::clone(&events), file_size, last_used: stamp },
        );
        Ok(events)
    }

    /// Drop one run's entry (e.g. after its directory was deleted).
    pub fn invalidate(&self, run_id: &str) {
        self.inner.lock().entries.remove(run_id);
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.inner.lock().entries.len();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            entries,
            hits,
            misses,
            incremental_updates: self.incremental_updates.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 { 0.0 } else { hits as f64 / lookups as f64 },
        }
    }
}

fn evict_lru(inner: &mut Inner) {
    if let Some(oldest) = inner
        .entries
        .iter()
        .min_by_key(|(_, e)| e.last_used)
        .map(|(k, _)| k.clone())
    {
        inner.entries.remove(&oldest);
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
