// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rn-server: the Viewer's HTTP/WebSocket surface
//!
//! A thin layer over the storage, engine, archive, and remote crates:
//! validation and rate limiting in front, JSON in and out, blocking work
//! pushed onto the blocking pool. State is one `Arc<AppState>` built by
//! [`AppState::init`] in dependency order (spec'd singleton policy: every
//! process-wide handle is created here and nowhere else).

pub mod error;
pub mod handlers;
pub mod ratelimit;
pub mod validate;
pub mod ws;

pub use error::ApiError;
pub use ratelimit::{RateLimitPolicy, RateLimiter};

use axum::routing::{get, post};
use axum::Router;
use rn_core::{Config, SystemClock};
use rn_engine::MetricsCache;
use rn_remote::{ConnectionPool, KnownHosts, RemoteSupervisor};
use rn_storage::{DbPool, StorageLayout};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Everything handlers need, shared behind one `Arc`.
pub struct AppState {
    pub config: Config,
    pub layout: StorageLayout,
    pub pool: DbPool,
    pub cache: Arc<MetricsCache>,
    pub store: rn_archive::BlobStore,
    pub supervisor: Arc<RemoteSupervisor>,
    pub limiter: Arc<RateLimiter>,
    pub clock: SystemClock,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Build all process-wide singletons against one storage root.
    pub fn init(config: Config, storage_root: &Path) -> Result<SharedState, ApiError> {
        std::fs::create_dir_all(storage_root)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let layout = StorageLayout::new(storage_root);
        let pool = DbPool::open(&layout.db_path())?;
        let store = rn_archive::BlobStore::open(&config.archive_dir(storage_root))
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let cache = Arc::new(MetricsCache::new(rn_engine::cache::DEFAULT_CAPACITY));

        let known_hosts_path = rn_core::Config::known_hosts_path()
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let supervisor = Arc::new(RemoteSupervisor::new(
            Arc::new(ConnectionPool::new(config.remote.max_connections)),
            KnownHosts::new(&known_hosts_path),
            config.remote.auto_port_range,
        ));

        let limiter = Arc::new(RateLimiter::from_config(&config));

        Ok(Arc::new(AppState {
            config,
            layout,
            pool,
            cache,
            store,
            supervisor,
            limiter,
            clock: SystemClock,
        }))
    }
}

/// The full API router.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health::health))
        // Runs
        .route("/api/runs", get(handlers::runs::list))
        .route("/api/runs/soft-delete", post(handlers::runs::soft_delete))
        .route("/api/runs/:id", get(handlers::runs::detail))
        .route("/api/runs/:id/metrics", get(handlers::metrics::metrics))
        .route("/api/runs/:id/metrics_step", get(handlers::metrics::metrics_step))
        .route("/api/runs/:id/events", get(handlers::events::debug_events))
        .route("/api/runs/:id/media/*file", get(handlers::media::media))
        .route("/api/runs/:id/logs/ws", get(ws::logs_ws))
        .route("/api/metrics/cache/stats", get(handlers::metrics::cache_stats))
        // Recycle bin
        .route("/api/recycle-bin", get(handlers::runs::recycle_list))
        .route("/api/recycle-bin/restore", post(handlers::runs::recycle_restore))
        .route("/api/recycle-bin/empty", post(handlers::runs::recycle_empty))
        // Path hierarchy
        .route("/api/paths", get(handlers::paths::list))
        .route("/api/paths/tree", get(handlers::paths::tree))
        .route("/api/paths/runs", get(handlers::paths::runs_under))
        .route("/api/paths/soft-delete", post(handlers::paths::soft_delete))
        .route("/api/paths/export", get(handlers::paths::export))
        // Remote supervisor
        .route("/api/remote/connect", post(handlers::remote::connect))
        .route("/api/remote/accept-host-key", post(handlers::remote::accept_host_key))
        .route("/api/remote/conda-envs", get(handlers::remote::conda_envs))
        .route("/api/remote/config", get(handlers::remote::remote_config))
        .route("/api/remote/viewer/start", post(handlers::remote::viewer_start))
        .route("/api/remote/viewer/stop", post(handlers::remote::viewer_stop))
        .route("/api/remote/viewer/sessions", get(handlers::remote::viewer_sessions))
        .route(
            "/api/remote/viewer/status/:session_id",
            get(handlers::remote::viewer_status),
        )
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            ratelimit::middleware,
        ))
        .layer(tower_http::timeout::TimeoutLayer::new(Duration::from_secs(60)))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}

/// Serve until the token is cancelled.
pub async fn serve(
    state: SharedState,
    addr: SocketAddr,
    cancel: CancellationToken,
) -> Result<(), std::io::Error> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "viewer API listening");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { cancel.cancelled().await })
    .await
}
