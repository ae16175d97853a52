// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `GET /api/runs/:id/events`: raw event passthrough
//!
//! Debug endpoint: every well-formed JSON line, including unknown `type`
//! variants, is returned verbatim as parsed JSON. Unparsable lines are
//! skipped and counted.

use crate::{validate, ApiError, SharedState};
use axum::extract::{Path, Query, State};
use axum::Json;
use rn_storage::RunDir;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::{BufRead as _, BufReader};

#[derive(Debug, Deserialize, Default)]
pub struct EventsQuery {
    /// Cap on returned events (newest last); default 1000.
    pub limit: Option<usize>,
}

pub async fn debug_events(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Value>, ApiError> {
    let run_id = validate::run_id(&id)?;
    let limit = query.limit.unwrap_or(1000).clamp(1, 100_000);

    let layout = state.layout.clone();
    let (events, skipped) = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let location = layout
            .find_run(&run_id)
            .ok_or_else(|| ApiError::NotFound(format!("run not found: {run_id}")))?;
        let path = RunDir::new(&location.dir).events_path();
        let file = match std::fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok((Vec::new(), 0usize));
            }
            Err(e) => return Err(ApiError::Internal(e.to_string())),
        };

        let mut events: Vec<Value> = Vec::new();
        let mut skipped = 0usize;
        let mut reader = BufReader::new(file);
        let mut line = String::new();
        loop {
            line.clear();
            let n = reader.read_line(&mut line).map_err(|e| ApiError::Internal(e.to_string()))?;
            if n == 0 {
                break;
            }
            if !line.ends_with('\n') {
                break; // partial trailing line
            }
            match serde_json::from_str::<Value>(line.trim_end()) {
                Ok(value) => events.push(value),
                Err(_) => skipped += 1,
            }
        }
        // Keep the newest `limit` events
        if events.len() > limit {
            events.drain(..events.len() - limit);
        }
        Ok((events, skipped))
    })
    .await??;

    Ok(Json(json!({
        "events": events,
        "skipped": skipped,
    })))
}
