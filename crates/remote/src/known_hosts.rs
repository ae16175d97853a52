// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runicorn's private known_hosts store
//!
//! OpenSSH `known_hosts` format, one entry per line: `hostspec keytype
//! base64key`. This file is the sole source of truth for host-key policy;
//! the OS user's `~/.ssh/known_hosts` is never consulted. Hosts on
//! non-default ports use the `[host]:port` spec.

use base64::Engine as _;
use sha2::{Digest as _, Sha256};
use std::path::{Path, PathBuf};

/// One stored host key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostKeyRecord {
    pub host: String,
    pub port: u16,
    pub key_type: String,
    pub key_base64: String,
}

impl HostKeyRecord {
    pub fn hostspec(&self) -> String {
        if self.port == 22 {
            self.host.clone()
        } else {
            format!("[{}]:{}", self.host, self.port)
        }
    }

    pub fn fingerprint_sha256(&self) -> String {
        match base64::engine::general_purpose::STANDARD.decode(&self.key_base64) {
            Ok(bytes) => fingerprint_sha256(&bytes),
            Err(_) => String::new(),
        }
    }
}

/// Result of a lookup during connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyCheck {
    /// Key matches the stored record.
    Match,
    /// Host is known with a different key; carries the stored record.
    Mismatch(HostKeyRecord),
    /// Host has never been seen.
    Unknown,
}

/// OpenSSH-style fingerprint: `SHA256:` + unpadded base64 of the key
/// blob's SHA-256.
pub fn fingerprint_sha256(key_blob: &[u8]) -> String {
    let digest = Sha256::digest(key_blob);
    format!(
        "SHA256:{}",
        base64::engine::general_purpose::STANDARD_NO_PAD.encode(digest)
    )
}

/// Handle to the known_hosts file.
#[derive(Debug, Clone)]
pub struct KnownHosts {
    path: PathBuf,
}

impl KnownHosts {
    pub fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse every well-formed line; malformed lines are skipped, matching
    /// OpenSSH's tolerance.
    pub fn records(&self) -> std::io::Result<Vec<HostKeyRecord>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(text.lines().filter_map(parse_line).collect())
    }

    /// Check a key presented during handshake.
    pub fn check(
        &self,
        host: &str,
        port: u16,
        key_type: &str,
        key_blob: &[u8],
    ) -> std::io::Result<HostKeyCheck> {
        let presented = base64::engine::general_purpose::STANDARD.encode(key_blob);
        let mut mismatch: Option<HostKeyRecord> = None;
        for record in self.records()? {
            if record.host != host || record.port != port {
                continue;
            }
            if record.key_type == key_type && record.key_base64 == presented {
                return Ok(HostKeyCheck::Match);
            }
            mismatch = Some(record);
        }
        Ok(match mismatch {
            Some(record) => HostKeyCheck::Mismatch(record),
            None => HostKeyCheck::Unknown,
        })
    }

    /// Append a record, replacing any previous entries for the same
    /// host:port. The file is created with the usual SSH permissions.
    pub fn accept(&self, record: &HostKeyRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut kept: Vec<HostKeyRecord> = self
            .records()?
            .into_iter()
            .filter(|r| !(r.host == record.host && r.port == record.port))
            .collect();
        kept.push(record.clone());

        let mut out = String::new();
        for r in &kept {
            out.push_str(&format!("{} {} {}\n", r.hostspec(), r.key_type, r.key_base64));
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, out)?;
        set_private(&tmp)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::info!(host = %record.host, port = record.port, key_type = %record.key_type,
            "host key accepted");
        Ok(())
    }
}

fn parse_line(line: &str) -> Option<HostKeyRecord> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut parts = line.split_whitespace();
    let hostspec = parts.next()?;
    let key_type = parts.next()?;
    let key_base64 = parts.next()?;

    let (host, port) = if let Some(rest) = hostspec.strip_prefix('[') {
        let (host, port_part) = rest.split_once("]:")?;
        (host.to_string(), port_part.parse().ok()?)
    } else {
        (hostspec.to_string(), 22)
    };
    Some(HostKeyRecord {
        host,
        port,
        key_type: key_type.to_string(),
        key_base64: key_base64.to_string(),
    })
}

#[cfg(unix)]
fn set_private(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt as _;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_private(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "known_hosts_tests.rs"]
mod tests;
