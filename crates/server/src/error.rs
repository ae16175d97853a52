// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP error mapping
//!
//! Every layer's error kind maps to exactly one status code; bodies are
//! `{detail, code?}` plus structured extras where the contract demands
//! them (the host-key confirmation flow).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rn_remote::RemoteError;
use rn_storage::StorageError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{detail}")]
    Conflict {
        detail: String,
        code: &'static str,
        extra: Option<serde_json::Value>,
    },

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(detail = %self, "internal error");
        }
        let mut body = json!({ "detail": self.to_string() });
        match &self {
            ApiError::Conflict { code, extra, .. } => {
                body["code"] = json!(code);
                if let Some(extra) = extra {
                    if let (Some(obj), Some(extra)) = (body.as_object_mut(), extra.as_object())
                    {
                        for (k, v) in extra {
                            obj.insert(k.clone(), v.clone());
                        }
                    }
                }
            }
            ApiError::Internal(_) => {
                // Internal details go to the log, not the wire
                body = json!({ "detail": "internal server error" });
            }
            _ => {}
        }
        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::RunNotFound(id) => ApiError::NotFound(format!("run not found: {id}")),
            StorageError::Busy => ApiError::Unavailable("database busy, retry".to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<rn_engine::EngineError> for ApiError {
    fn from(e: rn_engine::EngineError) -> Self {
        match e {
            rn_engine::EngineError::Storage(inner) => inner.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<RemoteError> for ApiError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::HostKeyConfirmationRequired(prompt) => ApiError::Conflict {
                detail: "HOST_KEY_CONFIRMATION_REQUIRED".to_string(),
                code: "HOST_KEY_CONFIRMATION_REQUIRED",
                extra: serde_json::to_value(&*prompt)
                    .ok()
                    .map(|host_key| json!({ "host_key": host_key })),
            },
            RemoteError::ViewerAlreadyRunning(port) => ApiError::Conflict {
                detail: format!("a viewer is already running at remote port {port}"),
                code: "VIEWER_ALREADY_RUNNING",
                extra: None,
            },
            RemoteError::ConnectionNotFound(id) => {
                ApiError::NotFound(format!("connection not found: {id}"))
            }
            RemoteError::SessionNotFound(id) => {
                ApiError::NotFound(format!("session not found: {id}"))
            }
            RemoteError::AuthFailed { .. } | RemoteError::StartupTimeout(_) => {
                ApiError::BadRequest(e.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// A panicked or cancelled blocking task.
impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("task failed: {e}"))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
