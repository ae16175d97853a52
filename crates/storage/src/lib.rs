// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rn-storage: run-directory reading and the SQLite mirror
//!
//! The filesystem is authoritative; `runicorn.db` is a rebuildable index
//! over it. This crate owns both sides of that relationship: tolerant
//! readers for writer-owned run files, and the mirror's schema, pool,
//! queries, and reconciliation.

pub mod db;
pub mod layout;
pub mod recycle;
pub mod reconcile;
pub mod rundir;

pub use db::pool::DbPool;
pub use db::{experiments::ExperimentRow, Db};
pub use layout::{RunLocation, StorageLayout};
pub use recycle::RecycleBin;
pub use reconcile::{reconcile, zombie_sweep, ReconcileReport};
pub use rundir::RunDir;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("archive error: {0}")]
    Archive(#[from] rn_archive::ArchiveError),

    #[error("database is busy")]
    Busy,
}
