// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote supervisor endpoints
//!
//! Thin async shims over the blocking supervisor; every SSH round trip
//! rides the blocking pool. Credential fields are consumed from request
//! bodies and handed straight to the connection layer, never logged or
//! echoed.

use crate::{ApiError, SharedState};
use axum::extract::{Path, Query, State};
use axum::Json;
use rn_remote::{
    ConnectParams, HostKeyRecord, SshAuth, StartViewerRequest,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Deserialize)]
pub struct ConnectBody {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    /// `password` | `private_key` | `agent`
    pub auth_method: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub private_key_path: Option<String>,
    #[serde(default)]
    pub passphrase: Option<String>,
}

fn default_ssh_port() -> u16 {
    22
}

/// `POST /api/remote/connect`
pub async fn connect(
    State(state): State<SharedState>,
    Json(body): Json<ConnectBody>,
) -> Result<Json<Value>, ApiError> {
    let auth = match body.auth_method.as_str() {
        "password" => SshAuth::Password(
            body.password
                .ok_or_else(|| ApiError::BadRequest("password required".to_string()))?,
        ),
        "private_key" => SshAuth::KeyFile {
            path: body
                .private_key_path
                .ok_or_else(|| ApiError::BadRequest("private_key_path required".to_string()))?
                .into(),
            passphrase: body.passphrase,
        },
        "agent" => SshAuth::Agent,
        other => {
            return Err(ApiError::BadRequest(format!("unknown auth_method: {other:?}")));
        }
    };
    let params = ConnectParams {
        host: body.host,
        port: body.port,
        username: body.username,
        auth,
        connect_timeout: Duration::from_secs(state.config.remote.ssh_timeout),
        keepalive: Duration::from_secs(state.config.remote.keepalive),
    };

    let supervisor = std::sync::Arc::clone(&state.supervisor);
    let connection_id =
        tokio::task::spawn_blocking(move || supervisor.connect(params)).await??;
    Ok(Json(json!({ "connection_id": connection_id })))
}

#[derive(Deserialize)]
pub struct AcceptHostKeyBody {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub key_type: String,
    pub public_key: String,
    pub fingerprint_sha256: String,
}

/// `POST /api/remote/accept-host-key`
pub async fn accept_host_key(
    State(state): State<SharedState>,
    Json(body): Json<AcceptHostKeyBody>,
) -> Result<Json<Value>, ApiError> {
    let record = HostKeyRecord {
        host: body.host,
        port: body.port,
        key_type: body.key_type,
        key_base64: body.public_key,
    };
    // The client confirms the fingerprint it showed the operator; refuse a
    // key that does not hash to it
    if record.fingerprint_sha256() != body.fingerprint_sha256 {
        return Err(ApiError::BadRequest(
            "fingerprint does not match public key".to_string(),
        ));
    }
    let supervisor = std::sync::Arc::clone(&state.supervisor);
    tokio::task::spawn_blocking(move || supervisor.accept_host_key(&record)).await??;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct ConnectionQuery {
    pub connection_id: String,
    #[serde(default)]
    pub env: Option<String>,
}

/// `GET /api/remote/conda-envs`
pub async fn conda_envs(
    State(state): State<SharedState>,
    Query(query): Query<ConnectionQuery>,
) -> Result<Json<Value>, ApiError> {
    let supervisor = std::sync::Arc::clone(&state.supervisor);
    let envs = tokio::task::spawn_blocking(move || {
        let connection = supervisor.connection(&query.connection_id)?;
        rn_remote::probe_environments(&connection)
    })
    .await??;
    Ok(Json(json!({ "environments": envs })))
}

/// `GET /api/remote/config`: remote-side defaults for the given env.
pub async fn remote_config(
    State(state): State<SharedState>,
    Query(query): Query<ConnectionQuery>,
) -> Result<Json<Value>, ApiError> {
    let supervisor = std::sync::Arc::clone(&state.supervisor);
    let python = query.env.clone().unwrap_or_else(|| "python3".to_string());
    let output = tokio::task::spawn_blocking(move || {
        let connection = supervisor.connection(&query.connection_id)?;
        connection.exec(&format!("{} -m runicorn config show 2>/dev/null", python))
    })
    .await??;

    // The remote CLI prints YAML-ish config; pass structured output through
    // when it parses, raw text otherwise
    let parsed: Option<Value> = serde_json::from_str(&output.stdout).ok();
    Ok(Json(json!({
        "ok": output.success(),
        "config": parsed,
        "raw": output.stdout,
    })))
}

#[derive(Deserialize)]
pub struct StartBody {
    pub connection_id: String,
    #[serde(default)]
    pub remote_port: Option<u16>,
    #[serde(default)]
    pub local_port: Option<u16>,
    #[serde(default)]
    pub python: Option<String>,
    #[serde(default)]
    pub storage: Option<String>,
}

/// `POST /api/remote/viewer/start`
pub async fn viewer_start(
    State(state): State<SharedState>,
    Json(body): Json<StartBody>,
) -> Result<Json<Value>, ApiError> {
    let supervisor = std::sync::Arc::clone(&state.supervisor);
    let request = StartViewerRequest {
        connection_id: body.connection_id,
        remote_port: body.remote_port,
        local_port: body.local_port,
        python: body.python,
        storage: body.storage,
    };
    let info = tokio::task::spawn_blocking(move || supervisor.start_viewer(request)).await??;
    Ok(Json(json!({
        "session_id": info.session_id,
        "local_port": info.local_port,
        "remote_port": info.remote_port,
    })))
}

#[derive(Deserialize)]
pub struct StopBody {
    pub session_id: String,
}

/// `POST /api/remote/viewer/stop`
pub async fn viewer_stop(
    State(state): State<SharedState>,
    Json(body): Json<StopBody>,
) -> Result<Json<Value>, ApiError> {
    let supervisor = std::sync::Arc::clone(&state.supervisor);
    let info =
        tokio::task::spawn_blocking(move || supervisor.stop_viewer(&body.session_id)).await??;
    Ok(Json(json!({ "ok": true, "session": info })))
}

/// `GET /api/remote/viewer/sessions`
pub async fn viewer_sessions(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({ "sessions": state.supervisor.sessions() }))
}

/// `GET /api/remote/viewer/status/:session_id`
pub async fn viewer_status(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let info = state.supervisor.session(&session_id)?;
    Ok(Json(json!({ "session": info })))
}
