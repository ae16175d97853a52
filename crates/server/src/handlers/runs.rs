// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run listing, detail, soft delete, and the recycle bin

use crate::{validate, ApiError, SharedState};
use axum::extract::{Path, Query, State};
use axum::Json;
use rn_storage::db::experiments::{self, DeletedFilter, RunFilter};
use rn_storage::{RecycleBin, RunDir};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub path: Option<String>,
    pub status: Option<String>,
    /// `0` (default) live, `1` deleted, `all` everything.
    pub deleted: Option<String>,
    pub search: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

fn parse_filter(query: &ListQuery) -> Result<RunFilter, ApiError> {
    let path = match &query.path {
        Some(raw) => Some(validate::run_path(raw)?.as_str().to_string()),
        None => None,
    };
    let status = match &query.status {
        Some(raw) => Some(
            rn_core::RunStatus::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("invalid status: {raw:?}")))?,
        ),
        None => None,
    };
    let deleted = match query.deleted.as_deref() {
        None | Some("0") => DeletedFilter::Live,
        Some("1") => DeletedFilter::Deleted,
        Some("all") => DeletedFilter::All,
        Some(other) => {
            return Err(ApiError::BadRequest(format!("invalid deleted filter: {other:?}")));
        }
    };
    Ok(RunFilter {
        path,
        status,
        deleted,
        search: query.search.clone(),
        page: query.page.unwrap_or(1).max(1),
        per_page: query.per_page.unwrap_or(50),
    })
}

/// `GET /api/runs`
pub async fn list(
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let filter = parse_filter(&query)?;
    let per_page = filter.effective_per_page();
    let pool = state.pool.clone();
    let (rows, total) =
        tokio::task::spawn_blocking(move || pool.with_read(|conn| experiments::list(conn, &filter)))
            .await??;
    Ok(Json(json!({
        "runs": rows,
        "total": total,
        "page": query.page.unwrap_or(1).max(1),
        "per_page": per_page,
    })))
}

/// `GET /api/runs/:id`
pub async fn detail(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let run_id = validate::run_id(&id)?;
    let pool = state.pool.clone();
    let lookup_id = run_id.to_string();
    let row = tokio::task::spawn_blocking(move || {
        pool.with_read(|conn| experiments::get(conn, &lookup_id))
    })
    .await??
    .ok_or_else(|| ApiError::NotFound(format!("run not found: {id}")))?;

    let dir = std::path::PathBuf::from(&row.run_dir);
    let (summary, assets) = tokio::task::spawn_blocking(move || {
        let run = RunDir::new(&dir);
        (run.folded_summary(), run.asset_count())
    })
    .await?;

    Ok(Json(json!({
        "run": row,
        "summary": summary,
        "assets_count": assets,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RunIdsBody {
    pub run_ids: Vec<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

fn validated_ids(raw: &[String]) -> Result<Vec<String>, ApiError> {
    raw.iter()
        .map(|id| validate::run_id(id).map(|v| v.to_string()))
        .collect()
}

/// `POST /api/runs/soft-delete`
pub async fn soft_delete(
    State(state): State<SharedState>,
    Json(body): Json<RunIdsBody>,
) -> Result<Json<Value>, ApiError> {
    let ids = validated_ids(&body.run_ids)?;
    let bin = RecycleBin::new(state.layout.clone(), state.pool.clone());
    let clock = state.clock.clone();
    let deleted = tokio::task::spawn_blocking(move || {
        bin.soft_delete(&ids, body.reason.as_deref(), &clock)
    })
    .await??;
    Ok(Json(json!({ "deleted": deleted })))
}

/// `GET /api/recycle-bin`
pub async fn recycle_list(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let bin = RecycleBin::new(state.layout.clone(), state.pool.clone());
    let entries = tokio::task::spawn_blocking(move || bin.list()).await??;
    Ok(Json(json!({ "entries": entries })))
}

/// `POST /api/recycle-bin/restore`
pub async fn recycle_restore(
    State(state): State<SharedState>,
    Json(body): Json<RunIdsBody>,
) -> Result<Json<Value>, ApiError> {
    let ids = validated_ids(&body.run_ids)?;
    let bin = RecycleBin::new(state.layout.clone(), state.pool.clone());
    let restored = tokio::task::spawn_blocking(move || bin.restore(&ids)).await??;
    Ok(Json(json!({ "restored": restored })))
}

/// `POST /api/recycle-bin/empty`
pub async fn recycle_empty(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let bin = RecycleBin::new(state.layout.clone(), state.pool.clone());
    let store = state.store.clone();
    let report = tokio::task::spawn_blocking(move || bin.empty(&store)).await??;
    Ok(Json(json!({
        "removed_runs": report.removed_runs,
        "gc": {
            "scanned": report.gc.scanned,
            "deleted": report.gc.deleted,
            "freed_bytes": report.gc.freed_bytes,
        },
    })))
}

#[cfg(test)]
#[path = "runs_tests.rs"]
mod tests;
