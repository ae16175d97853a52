// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path-hierarchy endpoints
//!
//! The tree endpoint materializes the prefix trie over all run paths;
//! everything else is a view or bulk operation over path prefixes.

use crate::{validate, ApiError, SharedState};
use axum::extract::{Query, State};
use axum::Json;
use rn_storage::db::experiments::{self, DeletedFilter, PathStat, RunFilter};
use rn_storage::RecycleBin;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// `GET /api/paths`
pub async fn list(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let stats = fetch_stats(&state).await?;
    Ok(Json(json!({ "paths": stats })))
}

/// One trie node of the path hierarchy.
#[derive(Debug, Default, Serialize)]
pub struct TreeNode {
    /// Direct run count at exactly this path.
    pub run_count: i64,
    /// Runs at this path or below.
    pub total_runs: i64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, TreeNode>,
}

/// Build the prefix trie over `(path, run_count)` pairs.
pub fn build_tree(stats: &[PathStat]) -> TreeNode {
    let mut root = TreeNode::default();
    for stat in stats {
        root.total_runs += stat.run_count;
        let mut node = &mut root;
        for segment in stat.path.split('/') {
            node = node.children.entry(segment.to_string()).or_default();
            node.total_runs += stat.run_count;
        }
        node.run_count += stat.run_count;
    }
    root
}

/// `GET /api/paths/tree`
pub async fn tree(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let stats = fetch_stats(&state).await?;
    Ok(Json(json!({ "tree": build_tree(&stats) })))
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

/// `GET /api/paths/runs?path=`
pub async fn runs_under(
    State(state): State<SharedState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<Value>, ApiError> {
    let path = validate::run_path(&query.path)?;
    let pool = state.pool.clone();
    let filter = RunFilter {
        path: Some(path.as_str().to_string()),
        per_page: 1000,
        ..Default::default()
    };
    let (rows, total) =
        tokio::task::spawn_blocking(move || pool.with_read(|conn| experiments::list(conn, &filter)))
            .await??;
    Ok(Json(json!({ "runs": rows, "total": total })))
}

#[derive(Debug, Deserialize)]
pub struct PathsBody {
    pub paths: Vec<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// `POST /api/paths/soft-delete`: soft-delete every run under the paths.
pub async fn soft_delete(
    State(state): State<SharedState>,
    Json(body): Json<PathsBody>,
) -> Result<Json<Value>, ApiError> {
    let mut validated = Vec::with_capacity(body.paths.len());
    for raw in &body.paths {
        validated.push(validate::run_path(raw)?);
    }

    let pool = state.pool.clone();
    let bin = RecycleBin::new(state.layout.clone(), state.pool.clone());
    let clock = state.clock.clone();
    let reason = body.reason.clone();
    let deleted = tokio::task::spawn_blocking(move || -> Result<usize, ApiError> {
        let mut run_ids = Vec::new();
        for path in &validated {
            let filter = RunFilter {
                path: Some(path.as_str().to_string()),
                per_page: 1000,
                ..Default::default()
            };
            let (rows, _) = pool.with_read(|conn| experiments::list(conn, &filter))?;
            run_ids.extend(rows.into_iter().map(|r| r.run_id));
        }
        Ok(bin.soft_delete(&run_ids, reason.as_deref(), &clock)?)
    })
    .await??;
    Ok(Json(json!({ "deleted": deleted })))
}

/// `GET /api/paths/export`: the whole hierarchy plus run rows.
pub async fn export(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let stats = fetch_stats(&state).await?;
    let pool = state.pool.clone();
    let (rows, total) = tokio::task::spawn_blocking(move || {
        pool.with_read(|conn| {
            experiments::list(
                conn,
                &RunFilter { deleted: DeletedFilter::All, per_page: 1000, ..Default::default() },
            )
        })
    })
    .await??;

    Ok(Json(json!({
        "paths": stats,
        "tree": build_tree(&stats),
        "runs": rows,
        "total": total,
    })))
}

async fn fetch_stats(state: &SharedState) -> Result<Vec<PathStat>, ApiError> {
    let pool = state.pool.clone();
    Ok(
        tokio::task::spawn_blocking(move || pool.with_read(|conn| experiments::path_stats(conn)))
            .await??,
    )
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
