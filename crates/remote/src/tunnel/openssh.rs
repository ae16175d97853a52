// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OpenSSH binary tunnel backend
//!
//! Spawns `ssh -N -L` with `BatchMode=yes` (no prompts ever) and strict
//! host-key checking against Runicorn's known_hosts. Preferred when
//! available: the binary has the best agent and config compatibility.

use super::{Shutdown, TunnelHandle, TunnelParams};
use crate::connect::SshAuth;
use crate::known_hosts::KnownHosts;
use crate::RemoteError;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

/// Seconds to wait for the forwarded port to come up.
const ACCEPT_TIMEOUT: Duration = Duration::from_secs(60);

/// The binary can only be used when authentication needs no prompt:
/// agent auth, or a key file without a passphrase.
pub fn is_usable(auth: &SshAuth) -> bool {
    let auth_ok = match auth {
        SshAuth::Agent => true,
        SshAuth::KeyFile { passphrase, .. } => passphrase.is_none(),
        SshAuth::Password(_) => false,
    };
    auth_ok && ssh_on_path()
}

fn ssh_on_path() -> bool {
    Command::new("ssh")
        .arg("-V")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Arguments for the forwarding process.
pub(crate) fn build_args(params: &TunnelParams, known_hosts: &KnownHosts) -> Vec<String> {
    let mut args = vec![
        "-N".to_string(),
        "-L".to_string(),
        format!("127.0.0.1:{}:127.0.0.1:{}", params.local_port, params.remote_port),
        "-p".to_string(),
        params.connect.port.to_string(),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=yes".to_string(),
        "-o".to_string(),
        format!("UserKnownHostsFile={}", known_hosts.path().display()),
        "-o".to_string(),
        "ExitOnForwardFailure=yes".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", params.connect.connect_timeout.as_secs().max(1)),
        "-o".to_string(),
        format!("ServerAliveInterval={}", params.connect.keepalive.as_secs().max(1)),
    ];
    if let SshAuth::KeyFile { path, .. } = &params.connect.auth {
        args.push("-i".to_string());
        args.push(path.display().to_string());
    }
    args.push(format!("{}@{}", params.connect.username, params.connect.host));
    args
}

pub fn open(
    params: &TunnelParams,
    known_hosts: &KnownHosts,
) -> Result<TunnelHandle, RemoteError> {
    let args = build_args(params, known_hosts);
    debug!(?args, "spawning openssh tunnel");
    let mut child = Command::new("ssh")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    // Wait for the forward to come up (or the child to give up)
    let deadline = Instant::now() + ACCEPT_TIMEOUT;
    loop {
        if let Some(status) = child.try_wait()? {
            return Err(RemoteError::TunnelFailed(format!(
                "ssh exited during setup: {}",
                status
            )));
        }
        if port_listening(params.local_port) {
            break;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RemoteError::TunnelFailed(
                "forwarded port never came up".to_string(),
            ));
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    Ok(TunnelHandle::new(params.local_port, "openssh", Shutdown::Process(child)))
}

fn port_listening(port: u16) -> bool {
    std::net::TcpStream::connect_timeout(
        &std::net::SocketAddr::from(([127, 0, 0, 1], port)),
        Duration::from_millis(200),
    )
    .is_ok()
}

#[cfg(test)]
#[path = "openssh_tests.rs"]
mod tests;
