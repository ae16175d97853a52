// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The remote session registry and supervisor
//!
//! A remote session is the triple (SSH connection, remote Viewer process,
//! local tunnel). States move strictly `connecting → running → stopping →
//! stopped`, with `error` as a terminal sink reachable from anywhere.
//! Blocking SSH work happens on the caller's thread; the HTTP layer wraps
//! these calls in `spawn_blocking`.

use crate::connect::{ConnectParams, ConnectionPool, SshConnection};
use crate::known_hosts::{HostKeyRecord, KnownHosts};
use crate::tunnel::{open_tunnel, TunnelHandle, TunnelParams};
use crate::{ports, RemoteError};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Lifecycle of one remote session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Connecting,
    Running,
    Stopping,
    Stopped,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoteSessionInfo {
    pub session_id: String,
    pub connection_id: String,
    pub host: String,
    pub username: String,
    pub local_port: u16,
    pub remote_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_pid: Option<u32>,
    pub status: SessionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub backend: String,
    /// Epoch seconds when the session reached `running`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<f64>,
}

struct SessionEntry {
    info: RemoteSessionInfo,
    tunnel: Option<TunnelHandle>,
    health_cancel: CancellationToken,
}

#[derive(Debug, Clone, Default)]
pub struct StartViewerRequest {
    pub connection_id: String,
    /// Caller-chosen ports; `None` probes for free ones.
    pub remote_port: Option<u16>,
    pub local_port: Option<u16>,
    /// Remote interpreter used to launch the Viewer (`python3` default).
    pub python: Option<String>,
    /// Remote storage root override.
    pub storage: Option<String>,
}

/// Process-wide supervisor; see the singleton policy in the server crate.
pub struct RemoteSupervisor {
    pool: Arc<ConnectionPool>,
    known_hosts: KnownHosts,
    auto_port_range: (u16, u16),
    sessions: Arc<Mutex<HashMap<String, SessionEntry>>>,
}

const HEALTH_INTERVAL: Duration = Duration::from_secs(30);
const HEALTH_FAILURE_LIMIT: u32 = 3;
const STARTUP_TIMEOUT_SECS: u64 = 60;
const STOP_GRACE: Duration = Duration::from_secs(10);

impl RemoteSupervisor {
    pub fn new(
        pool: Arc<ConnectionPool>,
        known_hosts: KnownHosts,
        auto_port_range: (u16, u16),
    ) -> Self {
        Self {
            pool,
            known_hosts,
            auto_port_range,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Open (or reuse) an SSH connection; host-key policy applies.
    pub fn connect(&self, params: ConnectParams) -> Result<String, RemoteError> {
        self.pool.connect(params, &self.known_hosts)
    }

    /// Persist an operator-confirmed host key.
    pub fn accept_host_key(&self, record: &HostKeyRecord) -> Result<(), RemoteError> {
        self.known_hosts.accept(record)?;
        Ok(())
    }

    pub fn connection(&self, connection_id: &str) -> Result<Arc<SshConnection>, RemoteError> {
        self.pool.get(connection_id)
    }

    pub fn sessions(&self) -> Vec<RemoteSessionInfo> {
        self.sessions.lock().values().map(|e| e.info.clone()).collect()
    }

    pub fn session(&self, session_id: &str) -> Result<RemoteSessionInfo, RemoteError> {
        self.sessions
            .lock()
            .get(session_id)
            .map(|e| e.info.clone())
            .ok_or_else(|| RemoteError::SessionNotFound(session_id.to_string()))
    }

    /// Launch a remote Viewer and tunnel to it. Blocking; run on a blocking
    /// thread.
    pub fn start_viewer(
        &self,
        request: StartViewerRequest,
    ) -> Result<RemoteSessionInfo, RemoteError> {
        let connection = self.pool.get(&request.connection_id)?;

        let remote_port = match request.remote_port {
            Some(port) => port,
            None => ports::free_remote_port(&connection, self.auto_port_range)?,
        };

        // One Viewer per (connection, remote port)
        {
            let sessions = self.sessions.lock();
            let duplicate = sessions.values().any(|e| {
                e.info.connection_id == request.connection_id
                    && e.info.remote_port == remote_port
                    && matches!(
                        e.info.status,
                        SessionState::Connecting | SessionState::Running
                    )
            });
            if duplicate {
                return Err(RemoteError::ViewerAlreadyRunning(remote_port));
            }
        }

        let session_id = format!("rsess-{}", nanoid::nanoid!(12));
        let params = connection.params().clone();
        let mut info = RemoteSessionInfo {
            session_id: session_id.clone(),
            connection_id: request.connection_id.clone(),
            host: params.host.clone(),
            username: params.username.clone(),
            local_port: 0,
            remote_port,
            remote_pid: None,
            status: SessionState::Connecting,
            reason: None,
            backend: String::new(),
            started_at: None,
        };
        self.sessions.lock().insert(
            session_id.clone(),
            SessionEntry {
                info: info.clone(),
                tunnel: None,
                health_cancel: CancellationToken::new(),
            },
        );

        match self.bring_up(&connection, &params, &request, remote_port, &mut info) {
            Ok(tunnel) => {
                let cancel = CancellationToken::new();
                {
                    let mut sessions = self.sessions.lock();
                    if let Some(entry) = sessions.get_mut(&session_id) {
                        entry.info = info.clone();
                        entry.tunnel = Some(tunnel);
                        entry.health_cancel = cancel.clone();
                    }
                }
                self.spawn_health_loop(&session_id, info.local_port, cancel);
                info!(session_id = %session_id, local = info.local_port,
                    remote = remote_port, "remote viewer session running");
                Ok(info)
            }
            Err(e) => {
                self.fail_session(&session_id, &e.to_string());
                Err(e)
            }
        }
    }

    /// The fallible middle of `start_viewer`: launch, readiness, tunnel,
    /// first probe.
    fn bring_up(
        &self,
        connection: &SshConnection,
        params: &ConnectParams,
        request: &StartViewerRequest,
        remote_port: u16,
        info: &mut RemoteSessionInfo,
    ) -> Result<TunnelHandle, RemoteError> {
        let pid = launch_remote_viewer(connection, request, remote_port)?;
        info.remote_pid = Some(pid);

        wait_remote_ready(connection, remote_port)?;

        let local_port = match request.local_port {
            Some(port) => {
                if !ports::local_port_available(port) {
                    return Err(RemoteError::LocalPortTaken(port));
                }
                port
            }
            None => ports::free_local_port()?,
        };

        let tunnel = open_tunnel(
            &TunnelParams { connect: params.clone(), local_port, remote_port },
            &self.known_hosts,
        )?;

        // Never report running before the tunnel has served a probe
        if !probe_local_health(local_port, Duration::from_secs(10)) {
            return Err(RemoteError::TunnelFailed(
                "tunnel up but health probe failed".to_string(),
            ));
        }

        info.local_port = local_port;
        info.backend = tunnel.backend.to_string();
        info.status = SessionState::Running;
        info.started_at = Some(epoch_secs());
        Ok(tunnel)
    }

    /// Stop a session: SIGTERM, grace, SIGKILL, tunnel teardown, temp-log
    /// removal.
    pub fn stop_viewer(&self, session_id: &str) -> Result<RemoteSessionInfo, RemoteError> {
        let (connection_id, remote_pid, remote_port, mut tunnel, cancel) = {
            let mut sessions = self.sessions.lock();
            let entry = sessions
                .get_mut(session_id)
                .ok_or_else(|| RemoteError::SessionNotFound(session_id.to_string()))?;
            entry.info.status = SessionState::Stopping;
            (
                entry.info.connection_id.clone(),
                entry.info.remote_pid,
                entry.info.remote_port,
                entry.tunnel.take(),
                entry.health_cancel.clone(),
            )
        };
        cancel.cancel();

        if let Ok(connection) = self.pool.get(&connection_id) {
            if let Some(pid) = remote_pid {
                terminate_remote(&connection, pid);
            }
            let _ = connection
                .exec(&format!("rm -f /tmp/runicorn_viewer_{}.log", remote_port));
        }
        if let Some(tunnel) = tunnel.as_mut() {
            tunnel.stop();
        }

        let mut sessions = self.sessions.lock();
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| RemoteError::SessionNotFound(session_id.to_string()))?;
        entry.info.status = SessionState::Stopped;
        info!(session_id, "remote viewer session stopped");
        Ok(entry.info.clone())
    }

    /// Every session on a broken SSH connection becomes terminal `error`.
    pub fn mark_connection_error(&self, connection_id: &str, reason: &str) {
        let mut sessions = self.sessions.lock();
        for entry in sessions.values_mut() {
            if entry.info.connection_id == connection_id
                && !matches!(entry.info.status, SessionState::Stopped | SessionState::Error)
            {
                entry.info.status = SessionState::Error;
                entry.info.reason = Some(reason.to_string());
                entry.health_cancel.cancel();
                if let Some(tunnel) = entry.tunnel.as_mut() {
                    tunnel.stop();
                }
                warn!(session_id = %entry.info.session_id, reason, "session errored");
            }
        }
    }

    fn fail_session(&self, session_id: &str, reason: &str) {
        let mut sessions = self.sessions.lock();
        if let Some(entry) = sessions.get_mut(session_id) {
            entry.info.status = SessionState::Error;
            entry.info.reason = Some(reason.to_string());
            entry.health_cancel.cancel();
            if let Some(tunnel) = entry.tunnel.as_mut() {
                tunnel.stop();
            }
        }
    }

    /// Periodic health probes over the tunnel; three consecutive failures
    /// are terminal. Requires a tokio runtime; without one (pure-CLI use)
    /// the loop is skipped and health is only checked on demand.
    fn spawn_health_loop(&self, session_id: &str, local_port: u16, cancel: CancellationToken) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let sessions = Arc::clone(&self.sessions);
        let session_id = session_id.to_string();
        runtime.spawn(async move {
            let url = format!("http://127.0.0.1:{}/api/health", local_port);
            let client = match reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
            {
                Ok(c) => c,
                Err(_) => return,
            };
            let mut failures = 0u32;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(HEALTH_INTERVAL) => {}
                }
                let healthy = matches!(
                    client.get(&url).send().await,
                    Ok(resp) if resp.status().is_success()
                );
                if healthy {
                    failures = 0;
                    continue;
                }
                failures += 1;
                warn!(session_id = %session_id, failures, "remote health probe failed");
                if failures >= HEALTH_FAILURE_LIMIT {
                    let mut sessions = sessions.lock();
                    if let Some(entry) = sessions.get_mut(&session_id) {
                        entry.info.status = SessionState::Error;
                        entry.info.reason = Some("health_check_failed".to_string());
                        if let Some(tunnel) = entry.tunnel.as_mut() {
                            tunnel.stop();
                        }
                    }
                    return;
                }
            }
        });
    }

    #[cfg(test)]
    pub(crate) fn insert_for_test(&self, info: RemoteSessionInfo) {
        self.sessions.lock().insert(
            info.session_id.clone(),
            SessionEntry { info, tunnel: None, health_cancel: CancellationToken::new() },
        );
    }
}

/// Start the remote Viewer detached, returning its PID.
fn launch_remote_viewer(
    connection: &SshConnection,
    request: &StartViewerRequest,
    remote_port: u16,
) -> Result<u32, RemoteError> {
    let python = request.python.as_deref().unwrap_or("python3");
    let storage = request
        .storage
        .as_deref()
        .map(|s| format!(" --storage {}", shell_quote(s)))
        .unwrap_or_default();
    let cmd = format!(
        "nohup {python} -m runicorn viewer --host 127.0.0.1 --port {port} --remote-mode{storage} \
         > /tmp/runicorn_viewer_{port}.log 2>&1 & echo $!",
        python = python,
        port = remote_port,
        storage = storage,
    );
    let out = connection.exec_checked(&cmd)?;
    out.stdout
        .trim()
        .parse()
        .map_err(|_| RemoteError::TunnelFailed("remote launch returned no PID".to_string()))
}

/// Poll the remote port for HTTP readiness with exponential backoff.
fn wait_remote_ready(connection: &SshConnection, remote_port: u16) -> Result<(), RemoteError> {
    let probe = format!(
        "curl -sf -o /dev/null http://127.0.0.1:{port}/api/health || \
         wget -q -O /dev/null http://127.0.0.1:{port}/api/health",
        port = remote_port
    );
    let deadline = Instant::now() + Duration::from_secs(STARTUP_TIMEOUT_SECS);
    let mut delay = Duration::from_millis(500);
    loop {
        if connection.exec(&probe).map(|o| o.success()).unwrap_or(false) {
            return Ok(());
        }
        if Instant::now() + delay >= deadline {
            return Err(RemoteError::StartupTimeout(STARTUP_TIMEOUT_SECS));
        }
        std::thread::sleep(delay);
        delay = (delay * 2).min(Duration::from_secs(8));
    }
}

/// SIGTERM, wait up to the grace period, then SIGKILL.
fn terminate_remote(connection: &SshConnection, pid: u32) {
    let _ = connection.exec(&format!("kill -TERM {}", pid));
    let deadline = Instant::now() + STOP_GRACE;
    while Instant::now() < deadline {
        let gone = connection
            .exec(&format!("kill -0 {} 2>/dev/null", pid))
            .map(|o| !o.success())
            .unwrap_or(true);
        if gone {
            return;
        }
        std::thread::sleep(Duration::from_secs(1));
    }
    let _ = connection.exec(&format!("kill -KILL {}", pid));
}

/// Plain HTTP GET of `/api/health` through the local tunnel end.
fn probe_local_health(local_port: u16, timeout: Duration) -> bool {
    use std::io::{Read as _, Write as _};

    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        let addr = std::net::SocketAddr::from(([127, 0, 0, 1], local_port));
        if let Ok(mut stream) =
            std::net::TcpStream::connect_timeout(&addr, Duration::from_millis(500))
        {
            let _ = stream.set_read_timeout(Some(Duration::from_secs(3)));
            let request = format!(
                "GET /api/health HTTP/1.1\r\nHost: 127.0.0.1:{}\r\nConnection: close\r\n\r\n",
                local_port
            );
            if stream.write_all(request.as_bytes()).is_ok() {
                let mut response = String::new();
                let _ = stream.take(256).read_to_string(&mut response);
                if response.starts_with("HTTP/1.1 200") || response.starts_with("HTTP/1.0 200")
                {
                    return true;
                }
            }
        }
        std::thread::sleep(Duration::from_millis(500));
    }
    false
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
