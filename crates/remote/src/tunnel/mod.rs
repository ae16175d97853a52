// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tunnel backends
//!
//! Three interchangeable ways to forward `127.0.0.1:<local>` to
//! `127.0.0.1:<remote>` on the SSH host, tried in order:
//!
//! 1. the OpenSSH binary (`ssh -N -L`), when on PATH and the auth method
//!    works without a prompt (`BatchMode=yes`),
//! 2. a native tunnel pumped on the tokio runtime,
//! 3. a native tunnel pumped on a dedicated thread (always available).
//!
//! Every backend enforces host-key checking against Runicorn's own
//! known_hosts; the native backends open their own dedicated SSH session
//! so tunnel traffic never contends with control-channel execs.

pub mod async_native;
pub mod openssh;
pub mod sync_native;

use crate::connect::ConnectParams;
use crate::known_hosts::KnownHosts;
use crate::RemoteError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct TunnelParams {
    pub connect: ConnectParams,
    pub local_port: u16,
    pub remote_port: u16,
}

enum Shutdown {
    Process(std::process::Child),
    Token(CancellationToken),
    Flag(Arc<AtomicBool>),
}

/// A live tunnel. Stopping is idempotent; dropping the handle stops it.
pub struct TunnelHandle {
    pub local_port: u16,
    pub backend: &'static str,
    shutdown: Option<Shutdown>,
}

impl TunnelHandle {
    fn new(local_port: u16, backend: &'static str, shutdown: Shutdown) -> Self {
        Self { local_port, backend, shutdown: Some(shutdown) }
    }

    pub fn stop(&mut self) {
        match self.shutdown.take() {
            Some(Shutdown::Process(mut child)) => {
                let _ = child.kill();
                let _ = child.wait();
            }
            Some(Shutdown::Token(token)) => token.cancel(),
            Some(Shutdown::Flag(flag)) => flag.store(true, Ordering::SeqCst),
            None => {}
        }
    }
}

impl Drop for TunnelHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Open a tunnel via the first backend that works.
pub fn open_tunnel(
    params: &TunnelParams,
    known_hosts: &KnownHosts,
) -> Result<TunnelHandle, RemoteError> {
    let mut failures: Vec<String> = Vec::new();

    if openssh::is_usable(&params.connect.auth) {
        match openssh::open(params, known_hosts) {
            Ok(handle) => {
                info!(local = params.local_port, remote = params.remote_port,
                    backend = handle.backend, "tunnel up");
                return Ok(handle);
            }
            Err(e) => {
                warn!(error = %e, "openssh tunnel backend failed");
                failures.push(format!("openssh: {}", e));
            }
        }
    }

    if tokio::runtime::Handle::try_current().is_ok() {
        match async_native::open(params, known_hosts) {
            Ok(handle) => {
                info!(local = params.local_port, remote = params.remote_port,
                    backend = handle.backend, "tunnel up");
                return Ok(handle);
            }
            Err(e) => {
                warn!(error = %e, "async native tunnel backend failed");
                failures.push(format!("async-native: {}", e));
            }
        }
    }

    match sync_native::open(params, known_hosts) {
        Ok(handle) => {
            info!(local = params.local_port, remote = params.remote_port,
                backend = handle.backend, "tunnel up");
            Ok(handle)
        }
        Err(e) => {
            failures.push(format!("sync-native: {}", e));
            Err(RemoteError::TunnelFailed(failures.join("; ")))
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
