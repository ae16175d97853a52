// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Asset and snapshot manifests
//!
//! `assets.json` is written by the SDK and read (never rewritten) by the
//! Viewer. Snapshot manifests describe an archived directory tree precisely
//! enough to restore it and to derive a stable fingerprint.

use crate::store::Digest;
use crate::ArchiveError;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::collections::HashSet;
use std::path::Path;

/// File name of the per-run asset manifest.
pub const ASSETS_FILE_NAME: &str = "assets.json";

/// Maximum lineage depth tolerated before bailing on an adversarial graph.
pub const MAX_LINEAGE_DEPTH: usize = 50;

/// Asset category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Code,
    Config,
    Dataset,
    Pretrained,
    Output,
    Custom,
}

/// How an asset is identified, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetIdType {
    Fingerprint,
    ArchivePath,
    SourceUri,
    Name,
}

/// Resolved identity of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetIdentity {
    pub id_type: AssetIdType,
    pub id_value: String,
}

/// One asset registered for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetEntry {
    pub kind: AssetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Whether the bytes are present in the blob archive.
    #[serde(default)]
    pub saved: bool,
    /// Blob address; required when `saved`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Original path relative to wherever the asset came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<String>,
    /// Run that produced this asset, when known (lineage edge).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producing_run: Option<String>,
}

impl AssetEntry {
    /// Identity per contract: first available of fingerprint, archive path,
    /// source URI, name.
    pub fn identity(&self) -> Option<AssetIdentity> {
        if let Some(digest) = &self.digest {
            return Some(AssetIdentity {
                id_type: AssetIdType::Fingerprint,
                id_value: digest.to_string(),
            });
        }
        if let Some(path) = &self.archive_path {
            return Some(AssetIdentity {
                id_type: AssetIdType::ArchivePath,
                id_value: path.clone(),
            });
        }
        if let Some(uri) = &self.source_uri {
            return Some(AssetIdentity { id_type: AssetIdType::SourceUri, id_value: uri.clone() });
        }
        self.name.as_ref().map(|name| AssetIdentity {
            id_type: AssetIdType::Name,
            id_value: name.clone(),
        })
    }
}

/// The per-run `assets.json` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetManifest {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
}

impl AssetManifest {
    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Digests of all saved assets.
    pub fn saved_digests(&self) -> impl Iterator<Item = &Digest> {
        self.assets.iter().filter(|a| a.saved).filter_map(|a| a.digest.as_ref())
    }
}

/// One file inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Relative path with forward slashes, platform-independent.
    pub path: String,
    pub size: u64,
    pub sha256: Digest,
    /// Unix mode bits; 0 on platforms without them.
    pub mode: u32,
}

/// Manifest of a workspace snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub entries: Vec<SnapshotEntry>,
}

impl SnapshotManifest {
    /// The snapshot's fingerprint: SHA-256 over `path\0digest\n` pairs in
    /// sorted path order. Stable across platforms and entry ordering.
    pub fn fingerprint(&self) -> Digest {
        let mut pairs: Vec<(&str, &str)> = self
            .entries
            .iter()
            .map(|e| (e.path.as_str(), e.sha256.as_str()))
            .collect();
        pairs.sort_unstable();

        let mut hasher = Sha256::new();
        for (path, digest) in pairs {
            hasher.update(path.as_bytes());
            hasher.update([0u8]);
            hasher.update(digest.as_bytes());
            hasher.update([b'\n']);
        }
        let out = hasher.finalize();
        let mut hex = String::with_capacity(64);
        for b in out {
            use std::fmt::Write as _;
            let _ = write!(hex, "{:02x}", b);
        }
        // The hex string above is a valid digest by construction
        Digest::parse(&hex).unwrap_or_else(|_| unreachable!())
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

/// Walk every `assets.json` under `storage_root` (recycle bin included) and
/// collect the digests still referenced by any manifest. This is the live
/// set for [`crate::BlobStore::gc`].
pub fn scan_live_digests(storage_root: &Path) -> Result<HashSet<Digest>, ArchiveError> {
    let mut live = HashSet::new();
    for entry in walkdir::WalkDir::new(storage_root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue, // unreadable subtree; skip rather than abort GC
        };
        if !entry.file_type().is_file() || entry.file_name() != ASSETS_FILE_NAME {
            continue;
        }
        match AssetManifest::load(entry.path()) {
            Ok(manifest) => live.extend(manifest.saved_digests().cloned()),
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e,
                    "skipping unreadable asset manifest");
            }
        }
    }
    Ok(live)
}

/// Walk asset lineage from a run: each asset may name a producing run, whose
/// assets are visited in turn. Carries a visited set and bails past
/// [`MAX_LINEAGE_DEPTH`] so adversarial manifests cannot loop the Viewer.
pub fn lineage_runs(
    start_run: &str,
    assets_for_run: impl Fn(&str) -> Vec<AssetEntry>,
) -> Result<Vec<String>, ArchiveError> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut order = Vec::new();
    let mut frontier = vec![start_run.to_string()];
    let mut depth = 0;

    while !frontier.is_empty() {
        if depth > MAX_LINEAGE_DEPTH {
            return Err(ArchiveError::LineageTooDeep(MAX_LINEAGE_DEPTH));
        }
        let mut next = Vec::new();
        for run in frontier {
            if !visited.insert(run.clone()) {
                continue;
            }
            for asset in assets_for_run(&run) {
                if let Some(producer) = asset.producing_run {
                    if !visited.contains(&producer) {
                        next.push(producer);
                    }
                }
            }
            order.push(run);
        }
        frontier = next;
        depth += 1;
    }
    Ok(order)
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
