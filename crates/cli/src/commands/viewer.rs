// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `runicorn viewer`: the long-running server process

use crate::context::Context;
use crate::exit_error::ExitError;
use clap::Args;
use fs2::FileExt as _;
use rn_engine::WatcherConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Args)]
pub struct ViewerArgs {
    /// Bind address (default from config)
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port (default from config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Launched by a remote supervisor: bind loopback only and skip
    /// anything interactive
    #[arg(long)]
    pub remote_mode: bool,
}

pub fn run(args: ViewerArgs, ctx: Context) -> Result<(), ExitError> {
    let mut config = ctx.config.clone();
    if let Some(host) = args.host {
        config.viewer.host = host;
    }
    if let Some(port) = args.port {
        config.viewer.port = port;
    }
    if args.remote_mode {
        // A tunneled viewer must never listen beyond loopback
        config.viewer.host = "127.0.0.1".to_string();
    }

    std::fs::create_dir_all(&ctx.storage_root)
        .map_err(|e| ExitError::general(e.to_string()))?;
    let _log_guard =
        crate::logging::init_with_file(&config.viewer.log_level, &ctx.storage_root.join("logs"));

    // One Viewer per storage root: the mirror is single-writer
    let lock_path = ctx.storage_root.join("viewer.lock");
    let lock_file = std::fs::File::create(&lock_path)
        .map_err(|e| ExitError::general(e.to_string()))?;
    if lock_file.try_lock_exclusive().is_err() {
        return Err(ExitError::general(format!(
            "another viewer already owns {}",
            ctx.storage_root.display()
        )));
    }

    let addr: SocketAddr = format!("{}:{}", config.viewer.host, config.viewer.port)
        .parse()
        .map_err(|_| {
            ExitError::usage(format!(
                "invalid bind address {}:{}",
                config.viewer.host, config.viewer.port
            ))
        })?;

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| ExitError::general(e.to_string()))?;
    runtime.block_on(async move {
        let state = rn_server::AppState::init(config.clone(), &ctx.storage_root)
            .map_err(|e| ExitError::general(e.to_string()))?;

        // Mirror warm-up before the first request lands
        {
            let layout = state.layout.clone();
            let pool = state.pool.clone();
            let clock = state.clock.clone();
            let hours = config.storage.zombie_threshold_hours;
            tokio::task::spawn_blocking(move || {
                rn_storage::reconcile(&layout, &pool, &clock, hours)
            })
            .await
            .map_err(|e| ExitError::general(e.to_string()))?
            .map_err(|e| ExitError::general(e.to_string()))?;
        }

        let cancel = CancellationToken::new();
        let watcher = tokio::spawn(rn_engine::run_watcher(
            state.layout.clone(),
            state.pool.clone(),
            state.store.clone(),
            std::sync::Arc::clone(&state.cache),
            state.clock.clone(),
            WatcherConfig {
                interval: Duration::from_secs(config.viewer.reconcile_interval_secs.max(1)),
                zombie_threshold_hours: config.storage.zombie_threshold_hours,
                recycle_retention_days: config.storage.recycle_retention_days,
            },
            cancel.clone(),
        ));

        let shutdown = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
                shutdown.cancel();
            }
        });

        let served = rn_server::serve(state, addr, cancel.clone()).await;
        cancel.cancel();
        let _ = watcher.await;
        served.map_err(|e| ExitError::general(e.to_string()))
    })
}
