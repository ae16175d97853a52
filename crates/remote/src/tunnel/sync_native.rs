// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Native tunnel on a dedicated thread
//!
//! The always-available fallback: opens its own SSH session and pumps all
//! connections in a single nonblocking loop, so no locks are needed and a
//! stalled peer cannot wedge the control channel.

use super::{Shutdown, TunnelHandle, TunnelParams};
use crate::connect::establish;
use crate::known_hosts::KnownHosts;
use crate::RemoteError;
use ssh2::{Channel, Session};
use std::io::{Read as _, Write as _};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const IDLE_SLEEP: Duration = Duration::from_millis(5);
const CHANNEL_OPEN_TIMEOUT_MS: u32 = 10_000;

pub fn open(
    params: &TunnelParams,
    known_hosts: &KnownHosts,
) -> Result<TunnelHandle, RemoteError> {
    let session = establish(&params.connect, known_hosts)?;
    let listener = TcpListener::bind(("127.0.0.1", params.local_port))?;
    listener.set_nonblocking(true)?;

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    let remote_port = params.remote_port;
    std::thread::Builder::new()
        .name(format!("rn-tunnel-{}", params.local_port))
        .spawn(move || pump_loop(session, listener, remote_port, flag))?;

    Ok(TunnelHandle::new(params.local_port, "sync-native", Shutdown::Flag(stop)))
}

struct Conn {
    stream: TcpStream,
    channel: Channel,
    local_eof: bool,
}

fn pump_loop(session: Session, listener: TcpListener, remote_port: u16, stop: Arc<AtomicBool>) {
    let mut conns: Vec<Conn> = Vec::new();
    let mut buf = [0u8; 16 * 1024];

    while !stop.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!(%peer, "tunnel connection accepted");
                if let Err(e) = stream.set_nonblocking(true) {
                    warn!(error = %e, "failed to configure tunnel socket");
                    continue;
                }
                session.set_blocking(true);
                session.set_timeout(CHANNEL_OPEN_TIMEOUT_MS);
                match session.channel_direct_tcpip("127.0.0.1", remote_port, None) {
                    Ok(channel) => {
                        conns.push(Conn { stream, channel, local_eof: false });
                    }
                    Err(e) => warn!(error = %e, "direct-tcpip channel open failed"),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => {
                warn!(error = %e, "tunnel listener failed");
                break;
            }
        }

        let mut progressed = false;
        conns.retain_mut(|conn| pump_conn(&session, conn, &mut buf, &mut progressed));

        if !progressed {
            std::thread::sleep(IDLE_SLEEP);
        }
    }

    for conn in conns.iter_mut() {
        let _ = conn.channel.close();
    }
    debug!("tunnel pump stopped");
}

/// Move bytes both ways for one connection. Returns false when the
/// connection is finished and should be dropped.
fn pump_conn(session: &Session, conn: &mut Conn, buf: &mut [u8], progressed: &mut bool) -> bool {
    // local → remote
    if !conn.local_eof {
        match conn.stream.read(buf) {
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
                // Remote side finished; drop once the local write queue is
                // naturally flushed (write_all above is synchronous)
                return false;
            }
        }
        Ok(n) => {
            if write_all_retry(&mut conn.stream, &buf[..n]).is_err() {
                return false;
            }
            *progressed = true;
        }
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
        Err(_) => return false,
    }
    true
}

/// `write_all` over a nonblocking socket, spinning briefly on WouldBlock.
fn write_all_retry(stream: &mut TcpStream, mut data: &[u8]) -> std::io::Result<()> {
    while !data.is_empty() {
        match stream.write(data) {
            Ok(0) => return Err(std::io::ErrorKind::WriteZero.into()),
            Ok(n) => data = &data[n..],
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
