// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Archiving files and directories into the blob store

use crate::manifest::{AssetEntry, AssetKind, SnapshotEntry, SnapshotManifest};
use crate::store::BlobStore;
use crate::ArchiveError;
use std::path::Path;

/// Optional descriptive metadata for an archived asset.
#[derive(Debug, Clone, Default)]
pub struct IngestMeta {
    pub description: Option<String>,
    pub source_uri: Option<String>,
    pub context: Option<String>,
}

/// Copy one file into the blob store and describe it as an asset entry.
pub fn archive_file(
    store: &BlobStore,
    kind: AssetKind,
    source: &Path,
    meta: IngestMeta,
) -> Result<AssetEntry, ArchiveError> {
    let (digest, size) = store.put(source)?;
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    Ok(AssetEntry {
        kind,
        name,
        description: meta.description,
        source_uri: meta.source_uri,
        context: meta.context,
        saved: true,
        digest: Some(digest),
        size: Some(size),
        original_path: Some(source.to_string_lossy().into_owned()),
        archive_path: None,
        producing_run: None,
    })
}

/// Recursively archive a directory; every file becomes a blob and the
/// returned manifest ties relative paths to digests.
pub fn archive_directory(
    store: &BlobStore,
    dir: &Path,
) -> Result<SnapshotManifest, ArchiveError> {
    let mut manifest = SnapshotManifest::default();
    for entry in walkdir::WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .map_err(|_| std::io::Error::other("path outside archive root"))?;
        let rel_path = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let metadata = entry.metadata().map_err(std::io::Error::from)?;
        let (digest, size) = store.put(entry.path())?;
        manifest.entries.push(SnapshotEntry {
            path: rel_path,
            size,
            sha256: digest,
            mode: mode_bits(&metadata),
        });
    }
    manifest.entries.sort_unstable_by(|a, b| a.path.cmp(&b.path));
    Ok(manifest)
}

#[cfg(unix)]
fn mode_bits(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt as _;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_bits(_metadata: &std::fs::Metadata) -> u32 {
    0
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
