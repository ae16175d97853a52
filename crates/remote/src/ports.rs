// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Port probing, local and remote

use crate::connect::SshConnection;
use crate::RemoteError;
use std::collections::HashSet;
use std::net::TcpListener;

/// Ask the OS for a free local port by binding port 0.
pub fn free_local_port() -> Result<u16, RemoteError> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

/// Verify a caller-chosen local port is actually free.
pub fn local_port_available(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// Find a free port on the remote host within `range`, using `ss` with a
/// `netstat` fallback for the listen set.
pub fn free_remote_port(
    connection: &SshConnection,
    range: (u16, u16),
) -> Result<u16, RemoteError> {
    let listening = remote_listen_set(connection)?;
    let (low, high) = range;
    for port in low..=high {
        if !listening.contains(&port) {
            return Ok(port);
        }
    }
    Err(RemoteError::NoFreePort(low, high))
}

/// Ports in the remote LISTEN set.
pub fn remote_listen_set(connection: &SshConnection) -> Result<HashSet<u16>, RemoteError> {
    let out = connection.exec("ss -ltn 2>/dev/null || netstat -ltn 2>/dev/null")?;
    Ok(parse_listening_ports(&out.stdout))
}

/// Parse `ss -ltn` / `netstat -ltn` output into the set of listening ports.
///
/// Both formats put the local address in a whitespace column that ends with
/// `:<port>`; everything else on the line is ignored.
pub fn parse_listening_ports(output: &str) -> HashSet<u16> {
    let mut ports = HashSet::new();
    for line in output.lines() {
        for field in line.split_whitespace() {
            // "0.0.0.0:8000", "[::]:8000", "*:8000"
            if let Some(idx) = field.rfind(':') {
                if let Ok(port) = field[idx + 1..].parse::<u16>() {
                    ports.insert(port);
                }
            }
        }
    }
    ports
}

#[cfg(test)]
#[path = "ports_tests.rs"]
mod tests;
