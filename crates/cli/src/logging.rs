// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing setup
//!
//! `RUNICORN_LOG` wins; otherwise the configured `viewer.log_level`
//! applies. The long-running `viewer` command also tees structured logs to
//! a daily-rolled file under the storage root.

use std::path::Path;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::EnvFilter;

fn filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_env("RUNICORN_LOG")
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()))
}

/// Stderr-only logging for one-shot commands.
pub fn init(log_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(filter(log_level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Stderr plus a rolling file under `log_dir` for the viewer process.
/// Returns the appender guard; dropping it stops the background writer.
pub fn init_with_file(
    log_level: &str,
    log_dir: &Path,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    if std::fs::create_dir_all(log_dir).is_err() {
        init(log_level);
        return None;
    }
    let appender = tracing_appender::rolling::daily(log_dir, "viewer.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let _ = tracing_subscriber::registry()
        .with(filter(log_level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init();
    Some(guard)
}
