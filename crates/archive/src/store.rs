// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SHA-256 content-addressed blob store
//!
//! Layout: `<archive_dir>/sha256/<aa>/<bb>/<remaining 60 hex chars>`.
//! Writes go through a temp file in the same directory tree so the final
//! rename is atomic on the same filesystem. A blob, once present, is never
//! rewritten.

use crate::ArchiveError;
use sha2::{Digest as _, Sha256};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SHARD_DIR: &str = "sha256";
const TMP_DIR: &str = "tmp";
const QUARANTINE_DIR: &str = "quarantine";

/// A validated lowercase SHA-256 hex digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(String);

impl Digest {
    pub fn parse(s: &str) -> Result<Self, ArchiveError> {
        let ok = s.len() == 64
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if ok {
            Ok(Self(s.to_string()))
        } else {
            Err(ArchiveError::InvalidDigest(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for Digest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Digest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Compute the SHA-256 of a file without loading it into memory.
pub fn hash_file(path: &Path) -> Result<Digest, ArchiveError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Digest(hex(&hasher.finalize())))
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        use std::fmt::Write as _;
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// Result of a garbage-collection sweep.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct GcReport {
    pub scanned: usize,
    pub deleted: usize,
    pub freed_bytes: u64,
}

/// Aggregate store statistics.
#[derive(Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub blobs: usize,
    pub total_bytes: u64,
}

/// Handle to one on-disk blob archive.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Open (and create if needed) the archive at `root`, sweeping any temp
    /// files a crashed writer left behind.
    pub fn open(root: &Path) -> Result<Self, ArchiveError> {
        let store = Self { root: root.to_path_buf() };
        fs::create_dir_all(store.root.join(SHARD_DIR))?;
        fs::create_dir_all(store.root.join(TMP_DIR))?;
        store.sweep_temp()?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk location for a digest.
    pub fn blob_path(&self, digest: &Digest) -> PathBuf {
        let d = digest.as_str();
        self.root.join(SHARD_DIR).join(&d[..2]).join(&d[2..4]).join(&d[4..])
    }

    pub fn has(&self, digest: &Digest) -> bool {
        self.blob_path(digest).is_file()
    }

    /// Open a blob for reading.
    pub fn open_blob(&self, digest: &Digest) -> Result<File, ArchiveError> {
        let path = self.blob_path(digest);
        File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ArchiveError::BlobNotFound(digest.to_string())
            } else {
                ArchiveError::Io(e)
            }
        })
    }

    /// Ingest a file, returning its digest and size.
    ///
    /// The source is hashed while being copied into a temp file inside the
    /// archive, then renamed into place. If the blob already exists the copy
    /// is discarded, which is what makes repeated puts cheap.
    pub fn put(&self, source: &Path) -> Result<(Digest, u64), ArchiveError> {
        let mut reader = File::open(source)?;
        let tmp_path = self.fresh_temp_path();
        let mut tmp = File::create(&tmp_path)?;

        let mut hasher = Sha256::new();
        let mut size = 0u64;
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            tmp.write_all(&buf[..n])?;
            size += n as u64;
        }
        tmp.sync_all()?;
        drop(tmp);

        let digest = Digest(hex(&hasher.finalize()));
        self.commit_temp(&tmp_path, &digest)?;
        Ok((digest, size))
    }

    /// Ingest an in-memory byte slice.
    pub fn put_bytes(&self, bytes: &[u8]) -> Result<(Digest, u64), ArchiveError> {
        let tmp_path = self.fresh_temp_path();
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(bytes)?;
        tmp.sync_all()?;
        drop(tmp);

        let digest = Digest(hex(&Sha256::digest(bytes)));
        self.commit_temp(&tmp_path, &digest)?;
        Ok((digest, bytes.len() as u64))
    }

    fn commit_temp(&self, tmp_path: &Path, digest: &Digest) -> Result<(), ArchiveError> {
        let target = self.blob_path(digest);
        if target.is_file() {
            // Deduplicated: the bytes are already archived
            fs::remove_file(tmp_path)?;
            return Ok(());
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(tmp_path, &target)?;
        debug!(digest = %digest, "archived blob");
        Ok(())
    }

    /// Materialize a blob at `dest`: hardlink when the filesystem allows it,
    /// byte-copy otherwise. Callers must not assume the hardlink succeeded.
    pub fn link_or_copy(&self, digest: &Digest, dest: &Path) -> Result<(), ArchiveError> {
        let source = self.blob_path(digest);
        if !source.is_file() {
            return Err(ArchiveError::BlobNotFound(digest.to_string()));
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        match fs::hard_link(&source, dest) {
            Ok(()) => Ok(()),
            Err(e) => {
                // Cross-device, unsupported FS, or ACL refusal
                debug!(digest = %digest, error = %e, "hardlink failed, copying");
                fs::copy(&source, dest)?;
                Ok(())
            }
        }
    }

    /// Re-hash a blob. On mismatch the file is moved to quarantine and an
    /// error is returned.
    pub fn verify(&self, digest: &Digest) -> Result<(), ArchiveError> {
        let path = self.blob_path(digest);
        if !path.is_file() {
            return Err(ArchiveError::BlobNotFound(digest.to_string()));
        }
        let actual = hash_file(&path)?;
        if actual == *digest {
            return Ok(());
        }
        self.quarantine(digest)?;
        Err(ArchiveError::CorruptBlob {
            digest: digest.to_string(),
            actual: actual.to_string(),
        })
    }

    fn quarantine(&self, digest: &Digest) -> Result<(), ArchiveError> {
        let quarantine = self.root.join(QUARANTINE_DIR);
        fs::create_dir_all(&quarantine)?;
        let from = self.blob_path(digest);
        let to = quarantine.join(digest.as_str());
        fs::rename(&from, &to)?;
        warn!(digest = %digest, "quarantined corrupt blob");
        Ok(())
    }

    /// Delete every blob whose digest is absent from `live`.
    pub fn gc(&self, live: &HashSet<Digest>) -> Result<GcReport, ArchiveError> {
        let mut report = GcReport::default();
        for (digest, path, size) in self.iter_blobs()? {
            report.scanned += 1;
            if !live.contains(&digest) {
                fs::remove_file(&path)?;
                report.deleted += 1;
                report.freed_bytes += size;
            }
        }
        if report.deleted > 0 {
            info!(
                deleted = report.deleted,
                freed_bytes = report.freed_bytes,
                "blob GC sweep complete"
            );
        }
        Ok(report)
    }

    /// Count blobs and total bytes.
    pub fn stats(&self) -> Result<StoreStats, ArchiveError> {
        let mut stats = StoreStats::default();
        for (_, _, size) in self.iter_blobs()? {
            stats.blobs += 1;
            stats.total_bytes += size;
        }
        Ok(stats)
    }

    fn iter_blobs(&self) -> Result<Vec<(Digest, PathBuf, u64)>, ArchiveError> {
        let mut out = Vec::new();
        let shard_root = self.root.join(SHARD_DIR);
        for entry in walkdir::WalkDir::new(&shard_root).min_depth(3).max_depth(3) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let digest = match digest_from_path(&shard_root, path) {
                Some(d) => d,
                None => continue, // stray file, not a blob
            };
            let size = entry.metadata().map_err(std::io::Error::from)?.len();
            out.push((digest, path.to_path_buf(), size));
        }
        Ok(out)
    }

    fn fresh_temp_path(&self) -> PathBuf {
        // PID + counter keeps names unique within and across processes
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(TMP_DIR)
            .join(format!("put-{}-{}.tmp", std::process::id(), n))
    }

    fn sweep_temp(&self) -> Result<(), ArchiveError> {
        let tmp = self.root.join(TMP_DIR);
        for entry in fs::read_dir(&tmp)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let _ = fs::remove_file(entry.path());
            }
        }
        Ok(())
    }
}

fn digest_from_path(shard_root: &Path, path: &Path) -> Option<Digest> {
    let rel = path.strip_prefix(shard_root).ok()?;
    let mut parts = rel.iter().filter_map(|c| c.to_str());
    let (a, b, rest) = (parts.next()?, parts.next()?, parts.next()?);
    Digest::parse(&format!("{}{}{}", a, b, rest)).ok()
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
