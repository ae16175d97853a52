// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log-tail WebSocket
//!
//! Streams `logs.txt` to the browser: current contents first, then new
//! tail bytes as the writer appends, polled at 500 ms. Truncation resets
//! the stream from offset 0. ANSI escapes pass through untouched; invalid
//! UTF-8 becomes U+FFFD so framing never corrupts. Five idle minutes
//! (no bytes, no client traffic) close the connection.

use crate::{validate, ApiError, SharedState};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use std::io::{Read as _, Seek as _, SeekFrom};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::debug;

/// Maximum bytes per text frame.
pub const FRAME_LIMIT: usize = 64 * 1024;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const IDLE_LIMIT: Duration = Duration::from_secs(300);

pub async fn logs_ws(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<SharedState>,
) -> Result<Response, ApiError> {
    let run_id = validate::run_id(&id)?;
    let layout = state.layout.clone();
    let location = tokio::task::spawn_blocking(move || layout.find_run(&run_id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("run not found: {id}")))?;

    let logs_path = rn_storage::RunDir::new(&location.dir).logs_path();
    Ok(ws.on_upgrade(move |socket| stream_logs(socket, logs_path)))
}

/// Split text into frames of at most [`FRAME_LIMIT`] bytes, breaking at
/// line boundaries when one exists inside the window.
pub fn frame_chunks(text: &str) -> Vec<String> {
    let mut frames = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        if rest.len() <= FRAME_LIMIT {
            frames.push(rest.to_string());
            break;
        }
        // Prefer the last newline within the window
        let window = floor_char_boundary(rest, FRAME_LIMIT);
        let cut = match rest[..window].rfind('\n') {
            Some(newline) => newline + 1,
            None => window,
        };
        frames.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    frames
}

// str::floor_char_boundary is still unstable; this is its documented
// behavior for the shrinking direction.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

async fn stream_logs(mut socket: WebSocket, logs_path: PathBuf) {
    let mut offset: u64 = 0;
    let mut last_activity = Instant::now();

    loop {
        // Detect growth or truncation
        let size = tokio::fs::metadata(&logs_path).await.map(|m| m.len()).unwrap_or(0);
        if size < offset {
            debug!(path = %logs_path.display(), "log file truncated, restarting stream");
            offset = 0;
        }
        if size > offset {
            match read_tail(&logs_path, offset, size).await {
                Ok(bytes) => {
                    offset = size;
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    for frame in frame_chunks(&text) {
                        if socket.send(Message::Text(frame)).await.is_err() {
                            return;
                        }
                    }
                    last_activity = Instant::now();
                }
                Err(e) => {
                    debug!(error = %e, "log read failed, closing stream");
                    let _ = socket.close().await;
                    return;
                }
            }
        }

        if last_activity.elapsed() >= IDLE_LIMIT {
            debug!("log stream idle, closing");
            let _ = socket.close().await;
            return;
        }

        // Sleep for the poll interval, staying responsive to the client
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                    Some(Ok(_)) => {
                        // Pings and client chatter count as activity
                        last_activity = Instant::now();
                    }
                }
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    }
}

async fn read_tail(path: &std::path::Path, from: u64, to: u64) -> std::io::Result<Vec<u8>> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut file = std::fs::File::open(&path)?;
        file.seek(SeekFrom::Start(from))?;
        let mut buf = vec![0u8; (to - from) as usize];
        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(buf)
    })
    .await
    .map_err(std::io::Error::other)?
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
