// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace snapshots
//!
//! Walks a workspace, honoring `.rnignore` (gitignore syntax), and emits a
//! ZIP with canonical forward-slash paths plus a manifest. Symlinks whose
//! target resolves outside the workspace root are skipped, so a hostile
//! workspace cannot pull `/etc` into a snapshot.

use crate::manifest::{SnapshotEntry, SnapshotManifest};
use crate::store::hash_file;
use crate::ArchiveError;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Name of the per-workspace ignore file.
pub const RNIGNORE_FILE: &str = ".rnignore";

/// Manifest entry embedded inside every snapshot ZIP.
pub const MANIFEST_ENTRY: &str = ".runicorn_manifest.json";

#[derive(Debug, Clone, Default)]
pub struct SnapshotOptions {
    /// Reject snapshots whose file bytes exceed this limit.
    pub max_total_bytes: Option<u64>,
}

#[derive(Debug)]
pub struct SnapshotOutput {
    pub manifest: SnapshotManifest,
    pub zip_path: PathBuf,
    pub total_bytes: u64,
    pub skipped: usize,
}

/// Snapshot `workspace` into a ZIP at `out_zip`.
pub fn snapshot_workspace(
    workspace: &Path,
    out_zip: &Path,
    options: &SnapshotOptions,
) -> Result<SnapshotOutput, ArchiveError> {
    let canonical_root = workspace.canonicalize()?;
    let files = collect_files(workspace, &canonical_root)?;

    let mut manifest = SnapshotManifest::default();
    let mut total_bytes = 0u64;
    for file in &files.included {
        total_bytes += file.size;
        if let Some(limit) = options.max_total_bytes {
            if total_bytes > limit {
                return Err(ArchiveError::SnapshotTooLarge {
                    total_bytes,
                    limit_bytes: limit,
                });
            }
        }
    }

    let out = File::create(out_zip)?;
    let mut zip = ZipWriter::new(out);

    for file in &files.included {
        let digest = hash_file(&file.abs_path)?;
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(file.mode);
        zip.start_file(file.rel_path.clone(), options)?;
        let mut input = File::open(&file.abs_path)?;
        std::io::copy(&mut input, &mut zip)?;

        manifest.entries.push(SnapshotEntry {
            path: file.rel_path.clone(),
            size: file.size,
            sha256: digest,
            mode: file.mode,
        });
    }
    manifest.entries.sort_unstable_by(|a, b| a.path.cmp(&b.path));

    // The manifest rides inside the ZIP so a snapshot is self-describing
    zip.start_file(
        MANIFEST_ENTRY,
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
    )?;
    use std::io::Write as _;
    zip.write_all(&serde_json::to_vec_pretty(&manifest)?)?;
    zip.finish()?;

    debug!(
        files = manifest.entries.len(),
        bytes = total_bytes,
        skipped = files.skipped,
        "workspace snapshot written"
    );
    Ok(SnapshotOutput { manifest, zip_path: out_zip.to_path_buf(), total_bytes, skipped: files.skipped })
}

struct CollectedFile {
    abs_path: PathBuf,
    rel_path: String,
    size: u64,
    mode: u32,
}

struct Collected {
    included: Vec<CollectedFile>,
    skipped: usize,
}

fn collect_files(workspace: &Path, canonical_root: &Path) -> Result<Collected, ArchiveError> {
    let mut included = Vec::new();
    let mut skipped = 0usize;

    let mut builder = ignore::WalkBuilder::new(workspace);
    builder
        .standard_filters(false)
        .hidden(false)
        .follow_links(false)
        .add_custom_ignore_filename(RNIGNORE_FILE);

    for entry in builder.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry during snapshot");
                skipped += 1;
                continue;
            }
        };
        let path = entry.path();
        let rel = match path.strip_prefix(workspace) {
            Ok(r) if !r.as_os_str().is_empty() => r,
            _ => continue, // the root itself
        };
        // VCS internals never belong in a snapshot
        if rel.components().next().is_some_and(|c| c.as_os_str() == ".git") {
            continue;
        }

        let file_type = match entry.file_type() {
            Some(t) => t,
            None => continue,
        };
        if file_type.is_dir() {
            continue;
        }

        // Symlink-escape defence: resolve and require the target under root
        let resolved = match path.canonicalize() {
            Ok(p) => p,
            Err(_) => {
                skipped += 1; // broken link
                continue;
            }
        };
        if !resolved.starts_with(canonical_root) {
            warn!(path = %path.display(), "skipping symlink escaping the workspace");
            skipped += 1;
            continue;
        }
        let metadata = match std::fs::metadata(&resolved) {
            Ok(m) if m.is_file() => m,
            _ => continue, // directory symlinks are walked by their real paths
        };

        included.push(CollectedFile {
            abs_path: resolved,
            rel_path: to_zip_path(rel),
            size: metadata.len(),
            mode: mode_bits(&metadata),
        });
    }

    included.sort_unstable_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(Collected { included, skipped })
}

fn to_zip_path(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
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
#[path = "snapshot_tests.rs"]
mod tests;
