// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rn-archive: content-addressed blob store and asset manifests
//!
//! Blobs are immutable byte sequences keyed by SHA-256 and shared across
//! runs via hardlinks. Manifests describe asset sets and workspace
//! snapshots well enough to restore them byte-for-byte.

pub mod ingest;
pub mod manifest;
pub mod restore;
pub mod snapshot;
pub mod store;

pub use ingest::{archive_directory, archive_file, IngestMeta};
pub use manifest::{
    scan_live_digests, AssetEntry, AssetIdentity, AssetKind, AssetManifest, SnapshotEntry,
    SnapshotManifest, ASSETS_FILE_NAME,
};
pub use restore::{restore_manifest, RestoreOptions};
pub use snapshot::{snapshot_workspace, SnapshotOptions, SnapshotOutput};
pub use store::{BlobStore, Digest, GcReport, StoreStats};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid digest: {0:?}")]
    InvalidDigest(String),

    #[error("blob not found: {0}")]
    BlobNotFound(String),

    #[error("blob {digest} is corrupt (hashed to {actual}); quarantined")]
    CorruptBlob { digest: String, actual: String },

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("snapshot exceeds size limit: {total_bytes} bytes > {limit_bytes} bytes")]
    SnapshotTooLarge { total_bytes: u64, limit_bytes: u64 },

    #[error("refusing to overwrite existing file: {0}")]
    WouldOverwrite(std::path::PathBuf),

    #[error("asset lineage exceeds depth limit {0}")]
    LineageTooDeep(usize),
}
