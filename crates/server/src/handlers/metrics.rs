// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metric series endpoints

use crate::{validate, ApiError, SharedState};
use axum::extract::{Path, Query, State};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rn_engine::{Axis, SeriesQuery, SeriesResponse};
use rn_storage::RunDir;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize, Default)]
pub struct MetricsQuery {
    /// Comma-separated metric names; absent means all.
    pub keys: Option<String>,
    pub downsample: Option<i64>,
}

/// `GET /api/runs/:id/metrics`: x-axis: timestamp.
pub async fn metrics(
    state: State<SharedState>,
    path: Path<String>,
    query: Query<MetricsQuery>,
) -> Result<Response, ApiError> {
    serve_series(state, path, query, Axis::Timestamp).await
}

/// `GET /api/runs/:id/metrics_step`: x-axis: step.
pub async fn metrics_step(
    state: State<SharedState>,
    path: Path<String>,
    query: Query<MetricsQuery>,
) -> Result<Response, ApiError> {
    serve_series(state, path, query, Axis::Step).await
}

async fn serve_series(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<MetricsQuery>,
    axis: Axis,
) -> Result<Response, ApiError> {
    let run_id = validate::run_id(&id)?;
    let downsample = validate::downsample(query.downsample)?;
    let keys = query.keys.as_deref().map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>()
    });

    let layout = state.layout.clone();
    let cache = std::sync::Arc::clone(&state.cache);
    let lookup_id = run_id.clone();
    let series = tokio::task::spawn_blocking(move || -> Result<SeriesResponse, ApiError> {
        let location = layout
            .find_run(&lookup_id)
            .ok_or_else(|| ApiError::NotFound(format!("run not found: {lookup_id}")))?;
        let events_path = RunDir::new(&location.dir).events_path();
        let events = cache
            .get(lookup_id.as_str(), &events_path)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok(rn_engine::series::build_series(
            &events,
            &SeriesQuery { keys, downsample, axis },
        ))
    })
    .await??;

    Ok(render_series(series))
}

/// Rows go to the wire as arrays `[timestamp, step, v...]` matching the
/// `columns` header.
fn render_series(series: SeriesResponse) -> Response {
    let rows: Vec<Value> = series
        .rows
        .iter()
        .map(|row| {
            let mut cells = Vec::with_capacity(2 + row.values.len());
            cells.push(json!(row.timestamp));
            cells.push(json!(row.step));
            cells.extend(row.values.iter().map(|v| json!(v)));
            Value::Array(cells)
        })
        .collect();

    let body = json!({
        "columns": series.columns,
        "rows": rows,
        "total": series.total,
        "sampled": series.sampled,
    });
    let mut response = Json(body).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&series.rows.len().to_string()) {
        headers.insert("X-Row-Count", value);
    }
    if let Ok(value) = HeaderValue::from_str(&series.total.to_string()) {
        headers.insert("X-Total-Count", value);
    }
    if let Some(last_step) = series.last_step {
        if let Ok(value) = HeaderValue::from_str(&last_step.to_string()) {
            headers.insert("X-Last-Step", value);
        }
    }
    response
}

/// `GET /api/metrics/cache/stats`
pub async fn cache_stats(State(state): State<SharedState>) -> Json<Value> {
    let stats = state.cache.stats();
    Json(json!({
        "entries": stats.entries,
        "hits": stats.hits,
        "misses": stats.misses,
        "incremental_updates": stats.incremental_updates,
        "hit_rate": stats.hit_rate,
    }))
}
