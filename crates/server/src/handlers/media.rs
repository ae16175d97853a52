// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `GET /api/runs/:id/media/*file`: guarded file downloads

use crate::{validate, ApiError, SharedState};
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};

pub async fn media(
    State(state): State<SharedState>,
    Path((id, file)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let run_id = validate::run_id(&id)?;

    let layout = state.layout.clone();
    let (bytes, content_type) = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let location = layout
            .find_run(&run_id)
            .ok_or_else(|| ApiError::NotFound(format!("run not found: {run_id}")))?;
        // Canonical-prefix check in addition to component validation
        let resolved = validate::safe_join(&location.dir, &file)?;
        let bytes = std::fs::read(&resolved).map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok((bytes, content_type_for(&file)))
    })
    .await??;

    let mut response = bytes.into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    Ok(response)
}

fn content_type_for(path: &str) -> &'static str {
    match path.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("txt") | Some("log") => "text/plain; charset=utf-8",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        png = { "media/plot.png", "image/png" },
        jpeg_upper = { "media/PHOTO.JPEG", "image/jpeg" },
        json = { "assets.json", "application/json" },
        unknown = { "blob.bin", "application/octet-stream" },
        extensionless = { "README", "application/octet-stream" },
    )]
    fn content_types(path: &str, expected: &str) {
        assert_eq!(content_type_for(path), expected);
    }
}
