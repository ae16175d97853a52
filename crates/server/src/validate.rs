// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request validation
//!
//! Every path segment naming a run, project, or file is validated before
//! any disk access. File downloads additionally pass a canonical-prefix
//! check against the run directory, closing symlink and `..` escapes that
//! survive component-wise validation.

use crate::ApiError;
use rn_core::{RunId, RunPath};
use std::path::{Path, PathBuf};

/// Validate a run ID path segment (`^[0-9]{8}_[0-9]{6}_[a-f0-9]{6}$`).
pub fn run_id(raw: &str) -> Result<RunId, ApiError> {
    RunId::parse(raw).map_err(|_| ApiError::BadRequest(format!("invalid run id: {raw:?}")))
}

/// Validate a hierarchical path label.
pub fn run_path(raw: &str) -> Result<RunPath, ApiError> {
    RunPath::parse(raw).map_err(|e| ApiError::BadRequest(format!("invalid path: {e}")))
}

/// Validate `downsample`: positive when present.
pub fn downsample(raw: Option<i64>) -> Result<Option<usize>, ApiError> {
    match raw {
        None => Ok(None),
        Some(n) if n > 0 => Ok(Some(n as usize)),
        Some(n) => Err(ApiError::BadRequest(format!("downsample must be positive, got {n}"))),
    }
}

/// Resolve `relative` under `run_dir` for download.
///
/// Rejects absolute paths, backslashes, and `..` components, then
/// canonicalizes and requires the result to remain prefixed by the
/// canonical run directory.
pub fn safe_join(run_dir: &Path, relative: &str) -> Result<PathBuf, ApiError> {
    if relative.is_empty()
        || relative.starts_with('/')
        || relative.contains('\\')
        || relative.split('/').any(|seg| seg.is_empty() || seg == "..")
    {
        return Err(ApiError::BadRequest(format!("invalid file path: {relative:?}")));
    }

    let joined = run_dir.join(relative);
    let canonical_root = run_dir
        .canonicalize()
        .map_err(|_| ApiError::NotFound("run directory missing".to_string()))?;
    let canonical = joined
        .canonicalize()
        .map_err(|_| ApiError::NotFound(format!("file not found: {relative}")))?;

    if !canonical.starts_with(&canonical_root) {
        return Err(ApiError::BadRequest("file path escapes the run directory".to_string()));
    }
    Ok(canonical)
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
