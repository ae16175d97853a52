// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rn-remote: SSH-backed remote Viewer supervision
//!
//! Connects to a remote host over SSH (strict host-key checking against
//! Runicorn's own known_hosts), launches a peer Viewer there, and plumbs a
//! local TCP port to it through one of three tunnel backends. Credentials
//! live in memory for the lifetime of a connection and are never written
//! anywhere.

pub mod connect;
pub mod envprobe;
pub mod known_hosts;
pub mod ports;
pub mod session;
pub mod tunnel;

pub use connect::{ConnectParams, ConnectionPool, ExecOutput, SshAuth, SshConnection};
pub use envprobe::{probe_environments, PythonEnv, PythonEnvKind};
pub use known_hosts::{HostKeyRecord, KnownHosts};
pub use session::{RemoteSessionInfo, RemoteSupervisor, SessionState, StartViewerRequest};
pub use tunnel::{open_tunnel, TunnelHandle, TunnelParams};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload behind `HOST_KEY_CONFIRMATION_REQUIRED`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostKeyPrompt {
    pub host: String,
    pub port: u16,
    pub key_type: String,
    pub fingerprint_sha256: String,
    /// Base64-encoded public key as it would appear in known_hosts.
    pub public_key: String,
    /// `"unknown"` for a first contact, `"changed"` for a mismatch.
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_fingerprint_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_public_key: Option<String>,
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    // The operator must confirm the key out of band; carries everything the
    // client needs to render the prompt
    #[error("host key confirmation required for {}:{}", .0.host, .0.port)]
    HostKeyConfirmationRequired(Box<HostKeyPrompt>),

    #[error("authentication failed for {user}@{host}")]
    AuthFailed { user: String, host: String },

    #[error("connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("a viewer is already running on this connection at remote port {0}")]
    ViewerAlreadyRunning(u16),

    #[error("remote command failed ({cmd}): exit {code}")]
    ExecFailed { cmd: String, code: i32 },

    #[error("no free port found in range {0}-{1}")]
    NoFreePort(u16, u16),

    #[error("local port {0} is already in use")]
    LocalPortTaken(u16),

    #[error("remote viewer did not become healthy within {0} seconds")]
    StartupTimeout(u64),

    #[error("all tunnel backends failed: {0}")]
    TunnelFailed(String),

    #[error("health probe failed: {0}")]
    Health(#[from] reqwest::Error),
}

impl RemoteError {
    /// Machine-readable error code for the HTTP surface.
    pub fn code(&self) -> &'static str {
        match self {
            RemoteError::HostKeyConfirmationRequired(_) => "HOST_KEY_CONFIRMATION_REQUIRED",
            RemoteError::AuthFailed { .. } => "AUTH_FAILED",
            RemoteError::ConnectionNotFound(_) => "CONNECTION_NOT_FOUND",
            RemoteError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            RemoteError::ViewerAlreadyRunning(_) => "VIEWER_ALREADY_RUNNING",
            RemoteError::StartupTimeout(_) => "STARTUP_TIMEOUT",
            _ => "REMOTE_ERROR",
        }
    }
}
