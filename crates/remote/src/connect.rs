// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH control connections and the connection pool
//!
//! Connections go through libssh2. Host keys are validated against
//! Runicorn's known_hosts immediately after the handshake, before any
//! authentication, and an unknown or changed key aborts with the structured
//! confirmation error. Live sessions are pooled per `user@host:port` and
//! evicted after ten idle minutes.

use crate::known_hosts::{fingerprint_sha256, HostKeyCheck, HostKeyRecord, KnownHosts};
use crate::{HostKeyPrompt, RemoteError};
use base64::Engine as _;
use parking_lot::Mutex;
use ssh2::Session;
use std::collections::HashMap;
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How a connection authenticates. Secrets are held in memory only.
#[derive(Clone)]
pub enum SshAuth {
    Password(String),
    KeyFile { path: PathBuf, passphrase: Option<String> },
    Agent,
}

impl std::fmt::Debug for SshAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never echo credentials, even at trace level
        match self {
            SshAuth::Password(_) => f.write_str("SshAuth::Password(..)"),
            SshAuth::KeyFile { path, .. } => {
                write!(f, "SshAuth::KeyFile({})", path.display())
            }
            SshAuth::Agent => f.write_str("SshAuth::Agent"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: SshAuth,
    pub connect_timeout: Duration,
    pub keepalive: Duration,
}

impl ConnectParams {
    pub fn pool_key(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

/// Output of one remote command.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// One authenticated SSH session, serialized behind a mutex.
pub struct SshConnection {
    session: Mutex<Session>,
    params: ConnectParams,
}

/// Establish one authenticated session: TCP, handshake, host-key check,
/// auth. Used for the pooled control session and for each native tunnel's
/// dedicated transport.
pub(crate) fn establish(
    params: &ConnectParams,
    known_hosts: &KnownHosts,
) -> Result<Session, RemoteError> {
    use std::net::ToSocketAddrs as _;

    let addrs: Vec<_> = (params.host.as_str(), params.port)
        .to_socket_addrs()?
        .collect();
    let addr = addrs
        .first()
        .ok_or_else(|| std::io::Error::other("host resolved to no addresses"))?;
    let tcp = TcpStream::connect_timeout(addr, params.connect_timeout)?;

    let mut session = Session::new()?;
    session.set_timeout(params.connect_timeout.as_millis() as u32);
    session.set_tcp_stream(tcp);
    session.handshake()?;

    verify_host_key(&session, params, known_hosts)?;
    authenticate(&session, params)?;

    session.set_keepalive(true, params.keepalive.as_secs().max(1) as u32);
    // Exec timeout applies from here on
    session.set_timeout(15_000);
    info!(peer = %params.pool_key(), "ssh connection established");
    Ok(session)
}

impl SshConnection {
    /// Connect, verify the host key, authenticate.
    pub fn connect(
        params: ConnectParams,
        known_hosts: &KnownHosts,
    ) -> Result<Self, RemoteError> {
        let session = establish(&params, known_hosts)?;
        Ok(Self { session: Mutex::new(session), params })
    }

    pub fn params(&self) -> &ConnectParams {
        &self.params
    }

    /// Run a command over a fresh channel on the control session.
    pub fn exec(&self, cmd: &str) -> Result<ExecOutput, RemoteError> {
        use std::io::Read as _;

        let session = self.session.lock();
        let mut channel = session.channel_session()?;
        channel.exec(cmd)?;

        let mut stdout = String::new();
        channel.read_to_string(&mut stdout)?;
        let mut stderr = String::new();
        channel.stderr().read_to_string(&mut stderr)?;
        channel.wait_close()?;
        let code = channel.exit_status()?;

        debug!(cmd, code, "remote exec");
        Ok(ExecOutput { stdout, stderr, code })
    }

    /// Like [`exec`](Self::exec) but failing on nonzero exit.
    pub fn exec_checked(&self, cmd: &str) -> Result<ExecOutput, RemoteError> {
        let out = self.exec(cmd)?;
        if out.success() {
            Ok(out)
        } else {
            Err(RemoteError::ExecFailed { cmd: cmd.to_string(), code: out.code })
        }
    }

    /// Cheap liveness probe of the control session.
    pub fn is_alive(&self) -> bool {
        self.exec("true").map(|out| out.success()).unwrap_or(false)
    }
}

fn verify_host_key(
    session: &Session,
    params: &ConnectParams,
    known_hosts: &KnownHosts,
) -> Result<(), RemoteError> {
    let (key_blob, key_type) = session
        .host_key()
        .ok_or_else(|| std::io::Error::other("server presented no host key"))?;
    let key_type = host_key_type_name(key_type);

    match known_hosts.check(&params.host, params.port, key_type, key_blob)? {
        HostKeyCheck::Match => Ok(()),
        HostKeyCheck::Unknown => {
            warn!(host = %params.host, port = params.port, "unknown host key");
            Err(RemoteError::HostKeyConfirmationRequired(Box::new(HostKeyPrompt {
                host: params.host.clone(),
                port: params.port,
                key_type: key_type.to_string(),
                fingerprint_sha256: fingerprint_sha256(key_blob),
                public_key: base64::engine::general_purpose::STANDARD.encode(key_blob),
                reason: "unknown".to_string(),
                expected_fingerprint_sha256: None,
                expected_public_key: None,
            })))
        }
        HostKeyCheck::Mismatch(stored) => {
            warn!(host = %params.host, port = params.port, "host key changed");
            Err(RemoteError::HostKeyConfirmationRequired(Box::new(HostKeyPrompt {
                host: params.host.clone(),
                port: params.port,
                key_type: key_type.to_string(),
                fingerprint_sha256: fingerprint_sha256(key_blob),
                public_key: base64::engine::general_purpose::STANDARD.encode(key_blob),
                reason: "changed".to_string(),
                expected_fingerprint_sha256: Some(stored.fingerprint_sha256()),
                expected_public_key: Some(stored.key_base64),
            })))
        }
    }
}

fn authenticate(session: &Session, params: &ConnectParams) -> Result<(), RemoteError> {
    let result = match &params.auth {
        SshAuth::Password(password) => {
            session.userauth_password(&params.username, password)
        }
        SshAuth::KeyFile { path, passphrase } => session.userauth_pubkey_file(
            &params.username,
            None,
            path,
            passphrase.as_deref(),
        ),
        SshAuth::Agent => session.userauth_agent(&params.username),
    };
    // The libssh2 error text can embed method details; keep it out of the
    // surfaced error so credentials never leak through messages
    if result.is_err() || !session.authenticated() {
        return Err(RemoteError::AuthFailed {
            user: params.username.clone(),
            host: params.host.clone(),
        });
    }
    Ok(())
}

pub(crate) fn host_key_type_name(key_type: ssh2::HostKeyType) -> &'static str {
    match key_type {
        ssh2::HostKeyType::Rsa => "ssh-rsa",
        ssh2::HostKeyType::Dss => "ssh-dss",
        ssh2::HostKeyType::Ecdsa256 => "ecdsa-sha2-nistp256",
        ssh2::HostKeyType::Ecdsa384 => "ecdsa-sha2-nistp384",
        ssh2::HostKeyType::Ecdsa521 => "ecdsa-sha2-nistp521",
        ssh2::HostKeyType::Ed25519 => "ssh-ed25519",
        _ => "unknown",
    }
}

struct PooledConnection {
    connection: Arc<SshConnection>,
    last_used: Instant,
}

/// Live-session pool keyed by `user@host:port`, with minted connection IDs.
pub struct ConnectionPool {
    inner: Mutex<HashMap<String, PooledConnection>>,
    /// connection_id → pool key
    ids: Mutex<HashMap<String, String>>,
    idle_limit: Duration,
    max_connections: usize,
}

/// Sessions idle past this are dropped.
pub const DEFAULT_IDLE_LIMIT: Duration = Duration::from_secs(600);

impl ConnectionPool {
    pub fn new(max_connections: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ids: Mutex::new(HashMap::new()),
            idle_limit: DEFAULT_IDLE_LIMIT,
            max_connections: max_connections.max(1),
        }
    }

    /// Connect (or reuse a live pooled session) and mint a connection ID.
    pub fn connect(
        &self,
        params: ConnectParams,
        known_hosts: &KnownHosts,
    ) -> Result<String, RemoteError> {
        self.evict_idle();
        let key = params.pool_key();

        let reusable = {
            let pool = self.inner.lock();
            pool.get(&key).map(|p| Arc::clone(&p.connection))
        };
        let connection = match reusable {
            Some(existing) if existing.is_alive() => existing,
            _ => {
                let fresh = Arc::new(SshConnection::connect(params, known_hosts)?);
                let mut pool = self.inner.lock();
                if pool.len() >= self.max_connections {
                    // Drop the stalest session to stay under the cap
                    if let Some(stalest) = pool
                        .iter()
                        .min_by_key(|(_, p)| p.last_used)
                        .map(|(k, _)| k.clone())
                    {
                        pool.remove(&stalest);
                    }
                }
                pool.insert(
                    key.clone(),
                    PooledConnection {
                        connection: Arc::clone(&fresh),
                        last_used: Instant::now(),
                    },
                );
                fresh
            }
        };
        drop(connection);

        let connection_id = format!("conn-{}", nanoid::nanoid!(12));
        self.ids.lock().insert(connection_id.clone(), key);
        Ok(connection_id)
    }

    /// Resolve a minted connection ID to its live session.
    pub fn get(&self, connection_id: &str) -> Result<Arc<SshConnection>, RemoteError> {
        let key = self
            .ids
            .lock()
            .get(connection_id)
            .cloned()
            .ok_or_else(|| RemoteError::ConnectionNotFound(connection_id.to_string()))?;
        let mut pool = self.inner.lock();
        let pooled = pool
            .get_mut(&key)
            .ok_or_else(|| RemoteError::ConnectionNotFound(connection_id.to_string()))?;
        pooled.last_used = Instant::now();
        Ok(Arc::clone(&pooled.connection))
    }

    /// Drop sessions idle past the limit. Returns the pool keys evicted.
    pub fn evict_idle(&self) -> Vec<String> {
        let mut pool = self.inner.lock();
        let stale: Vec<String> = pool
            .iter()
            .filter(|(_, p)| p.last_used.elapsed() > self.idle_limit)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            pool.remove(key);
            info!(peer = %key, "evicted idle ssh session");
        }
        stale
    }

    /// Pool keys for currently live sessions (diagnostics).
    pub fn live_keys(&self) -> Vec<String> {
        self.inner.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
#[path = "connect_tests.rs"]
mod tests;
