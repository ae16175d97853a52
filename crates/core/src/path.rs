// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hierarchical run labels
//!
//! A run's `path` is a user-chosen `/`-separated label used to organize runs
//! (e.g. `vision/resnet50/ablation`). The Viewer mirrors it onto the
//! filesystem, so validation is strict enough that a `RunPath` can be joined
//! under the storage root without escaping it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Maximum length of a run path in bytes.
pub const MAX_PATH_LEN: usize = 200;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunPathError {
    #[error("run path is empty")]
    Empty,

    #[error("run path exceeds {MAX_PATH_LEN} characters ({0})")]
    TooLong(usize),

    #[error("run path contains invalid character {0:?}")]
    InvalidChar(char),

    #[error("run path must not start with '/'")]
    LeadingSlash,

    #[error("run path contains an empty segment")]
    EmptySegment,

    #[error("run path contains a '..' segment")]
    ParentSegment,
}

/// A validated hierarchical run label.
///
/// Charset `[A-Za-z0-9_\-/]`, ≤ 200 bytes, no leading `/`, no empty or `..`
/// segments. Backslashes are rejected rather than normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RunPath(String);

impl RunPath {
    pub fn parse(s: &str) -> Result<Self, RunPathError> {
        validate(s)?;
        Ok(Self(s.to_string()))
    }

    /// Synthesize a path from the legacy `project`/`name` pair.
    ///
    /// Used only when `meta.json` carries no `path`; a path present on disk
    /// is always preserved verbatim.
    pub fn from_legacy(project: &str, name: &str) -> Result<Self, RunPathError> {
        Self::parse(&format!("{}/{}", project, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// The first segment (the legacy "project").
    pub fn project(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    /// Join this label under a root directory.
    ///
    /// Safe by construction: validation guarantees no absolute or `..`
    /// components survive parsing.
    pub fn join_under(&self, root: &Path) -> PathBuf {
        let mut out = root.to_path_buf();
        for seg in self.segments() {
            out.push(seg);
        }
        out
    }

    /// True if `self` equals `prefix` or is nested below it.
    pub fn starts_with(&self, prefix: &RunPath) -> bool {
        self.0 == prefix.0 || self.0.starts_with(&format!("{}/", prefix.0))
    }
}

fn validate(s: &str) -> Result<(), RunPathError> {
    if s.is_empty() {
        return Err(RunPathError::Empty);
    }
    if s.len() > MAX_PATH_LEN {
        return Err(RunPathError::TooLong(s.len()));
    }
    if s.starts_with('/') {
        return Err(RunPathError::LeadingSlash);
    }
    for seg in s.split('/') {
        if seg.is_empty() {
            return Err(RunPathError::EmptySegment);
        }
        if seg == ".." {
            return Err(RunPathError::ParentSegment);
        }
    }
    for c in s.chars() {
        let ok = c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/');
        if !ok {
            return Err(RunPathError::InvalidChar(c));
        }
    }
    Ok(())
}

impl std::fmt::Display for RunPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RunPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for RunPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for RunPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RunPath::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
