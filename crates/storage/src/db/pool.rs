// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection pool: one writer, N readers
//!
//! The Viewer process owns the mirror exclusively. All mutation goes
//! through the single writer connection; HTTP handlers multiplex over the
//! reader set. Handles are cheap to clone.

use super::{retry_busy, Db};
use crate::StorageError;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const DEFAULT_READERS: usize = 4;

struct Inner {
    writer: Mutex<Db>,
    readers: Vec<Mutex<Connection>>,
    next_reader: AtomicUsize,
}

/// Shared handle to the mirror database.
#[derive(Clone)]
pub struct DbPool {
    inner: Arc<Inner>,
}

impl DbPool {
    /// Open the mirror and a reader set against it.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Self::open_with_readers(path, DEFAULT_READERS)
    }

    pub fn open_with_readers(path: &Path, readers: usize) -> Result<Self, StorageError> {
        // Writer first: it creates the schema the readers expect
        let writer = Db::open(path)?;
        let mut reader_conns = Vec::with_capacity(readers);
        for _ in 0..readers.max(1) {
            let conn = Connection::open(path)?;
            conn.pragma_update(None, "query_only", true)?;
            conn.busy_timeout(std::time::Duration::from_millis(250))?;
            reader_conns.push(Mutex::new(conn));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                writer: Mutex::new(writer),
                readers: reader_conns,
                next_reader: AtomicUsize::new(0),
            }),
        })
    }

    /// Run a read-only query on the next reader connection.
    pub fn with_read<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let n = self.inner.next_reader.fetch_add(1, Ordering::Relaxed);
        let slot = &self.inner.readers[n % self.inner.readers.len()];
        let conn = slot.lock();
        f(&conn)
    }

    /// Run a mutation on the writer, retrying SQLITE_BUSY with backoff.
    pub fn with_write<T>(
        &self,
        mut f: impl FnMut(&mut Db) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        retry_busy(|| {
            let mut db = self.inner.writer.lock();
            f(&mut db)
        })
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
