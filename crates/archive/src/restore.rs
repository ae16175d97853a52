// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manifest-driven restore from the blob store

use crate::manifest::SnapshotManifest;
use crate::store::BlobStore;
use crate::ArchiveError;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Overwrite files that already exist at the target.
    pub force: bool,
}

/// Recreate a manifest's tree under `target`.
///
/// Each entry is hardlinked from the store when possible, byte-copied
/// otherwise. Existing files abort the restore unless `force` is set; the
/// check runs up front so a refused restore leaves the target untouched.
pub fn restore_manifest(
    store: &BlobStore,
    manifest: &SnapshotManifest,
    target: &Path,
    options: &RestoreOptions,
) -> Result<usize, ArchiveError> {
    if !options.force {
        for entry in &manifest.entries {
            let dest = target.join(&entry.path);
            if dest.exists() {
                return Err(ArchiveError::WouldOverwrite(dest));
            }
        }
    }

    for entry in &manifest.entries {
        let dest = target.join(&entry.path);
        if options.force && dest.exists() {
            std::fs::remove_file(&dest)?;
        }
        let blob_mode = mode_of(&store.blob_path(&entry.sha256));
        if entry.mode == 0 || blob_mode == Some(entry.mode) {
            store.link_or_copy(&entry.sha256, &dest)?;
        } else {
            // Hardlinks share the inode, so a chmod would rewrite the mode of
            // every other link to this blob. Differing modes get a copy.
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut src = store.open_blob(&entry.sha256)?;
            let mut out = std::fs::File::create(&dest)?;
            std::io::copy(&mut src, &mut out)?;
            set_mode(&dest, entry.mode)?;
        }
    }

    debug!(files = manifest.entries.len(), dest = %target.display(), "restore complete");
    Ok(manifest.entries.len())
}

#[cfg(unix)]
fn mode_of(path: &Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt as _;
    std::fs::metadata(path).ok().map(|m| m.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn mode_of(_path: &Path) -> Option<u32> {
    None
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt as _;
    if mode != 0 {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "restore_tests.rs"]
mod tests;
