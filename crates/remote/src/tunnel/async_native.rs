// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Native tunnel on the tokio runtime
//!
//! Same single-owner pump as the thread backend, expressed as one task
//! with cooperative cancellation. Channel I/O is nonblocking against a
//! session this task owns exclusively; local sockets use tokio's
//! `try_read`/`try_write` so a slow peer only delays its own connection.

use super::{Shutdown, TunnelHandle, TunnelParams};
use crate::connect::establish;
use crate::known_hosts::KnownHosts;
use crate::RemoteError;
use ssh2::{Channel, Session};
use std::io::{Read as _, Write as _};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const IDLE_SLEEP: Duration = Duration::from_millis(5);
const CHANNEL_OPEN_TIMEOUT_MS: u32 = 10_000;

/// Must be called from within a tokio runtime; the chain in
/// [`super::open_tunnel`] guarantees that.
pub fn open(
    params: &TunnelParams,
    known_hosts: &KnownHosts,
) -> Result<TunnelHandle, RemoteError> {
    let session = establish(&params.connect, known_hosts)?;

    let std_listener = std::net::TcpListener::bind(("127.0.0.1", params.local_port))?;
    std_listener.set_nonblocking(true)?;
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| RemoteError::TunnelFailed(format!("no tokio runtime: {}", e)))?;

    let token = CancellationToken::new();
    let task_token = token.clone();
    let remote_port = params.remote_port;
    runtime.spawn(async move {
        let listener = match TcpListener::from_std(std_listener) {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %e, "tunnel listener registration failed");
                return;
            }
        };
        pump_loop(session, listener, remote_port, task_token).await;
    });

    Ok(TunnelHandle::new(params.local_port, "async-native", Shutdown::Token(token)))
}

struct Conn {
    stream: TcpStream,
    channel: Channel,
    local_eof: bool,
}

async fn pump_loop(
    session: Session,
    listener: TcpListener,
    remote_port: u16,
    token: CancellationToken,
) {
    let mut conns: Vec<Conn> = Vec::new();
    let mut buf = [0u8; 16 * 1024];

    loop {
        if token.is_cancelled() {
            break;
        }

        // Accept without stalling the pump: wait only while idle
        let accept_wait = if conns.is_empty() { Duration::from_millis(250) } else { Duration::ZERO };
        tokio::select! {
            _ = token.cancelled() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "tunnel connection accepted");
                        session.set_blocking(true);
                        session.set_timeout(CHANNEL_OPEN_TIMEOUT_MS);
                        match session.channel_direct_tcpip("127.0.0.1", remote_port, None) {
                            Ok(channel) => conns.push(Conn { stream, channel, local_eof: false }),
                            Err(e) => warn!(error = %e, "direct-tcpip channel open failed"),
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "tunnel listener failed");
                        break;
                    }
                }
            }
            _ = tokio::time::sleep(accept_wait.max(IDLE_SLEEP)) => {}
        }

        let mut progressed = false;
        let mut kept = Vec::with_capacity(conns.len());
        for mut conn in conns.drain(..) {
            if pump_conn(&session, &mut conn, &mut buf, &mut progressed).await {
                kept.push(conn);
            }
        }
        conns = kept;

        if !progressed && !conns.is_empty() {
            tokio::time::sleep(IDLE_SLEEP).await;
        }
    }

    for conn in conns.iter_mut() {
        let _ = conn.channel.close();
    }
    debug!("tunnel pump stopped");
}

async fn pump_conn(
    session: &Session,
    conn: &mut Conn,
    buf: &mut [u8],
    progressed: &mut bool,
) -> bool {
    // local → remote
    if !conn.local_eof {
        match conn.stream.try_read(buf) {
            Ok(0) => {
                conn.local_eof = true;
                let _ = conn.channel.send_eof();
            }
            Ok(n) => {
                session.set_blocking(true);
                if conn.channel.write_all(&buf[..n]).is_err() {
                    return false;
                }
                *progressed = true;
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(_) => return false,
        }
    }

    // remote → local
    session.set_blocking(false);
    let read = conn.channel.read(buf);
    session.set_blocking(true);
    match read {
        Ok(0) => {
            if conn.channel.eof() {
                return false;
            }
        }
        Ok(n) => {
            use tokio::io::AsyncWriteExt as _;
            if conn.stream.write_all(&buf[..n]).await.is_err() {
                return false;
            }
            *progressed = true;
        }
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
        Err(_) => return false,
    }
    true
}
