// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{net::SocketAddr, process::ExitCode, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use luma_server::{
    api::router,
    auth::{NoopRevocationList, RedisRevocationList, RevocationChecker, TokenService, ValidationCache},
    config::Config,
    state::AppState,
    storage::Db,
    sweeper::TokenSweeper,
};

/// Entries kept in the per-process token validation cache.
const VALIDATION_CACHE_CAPACITY: usize = 4096;
/// How long a cached validation result is trusted.
const VALIDATION_CACHE_TTL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(config.log_json);

    let db = match Db::open(&config.db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!(path = %config.db_path.display(), error = %e, "Failed to open database");
            return ExitCode::FAILURE;
        }
    };
    info!(path = %config.db_path.display(), "Database opened");

    let revocation: Arc<dyn RevocationChecker> = match &config.redis_url {
        Some(url) => match RedisRevocationList::connect(url).await {
            Ok(list) => {
                info!("Connected to token revocation blacklist");
                Arc::new(list)
            }
            Err(e) => {
                // Fail open: persisted token rows remain authoritative for
                // refresh, only ad-hoc access-token revocation is degraded.
                warn!(error = %e, "Revocation blacklist unavailable, continuing without it");
                Arc::new(NoopRevocationList)
            }
        },
        None => {
            info!("No revocation blacklist configured");
            Arc::new(NoopRevocationList)
        }
    };

    let tokens = Arc::new(TokenService::new(
        db.clone(),
        revocation,
        config.access_secret.as_bytes(),
        config.refresh_secret.as_bytes(),
        config.token_ttls,
    ));
    let validation_cache = Arc::new(ValidationCache::new(
        VALIDATION_CACHE_CAPACITY,
        VALIDATION_CACHE_TTL,
    ));
    let state = AppState::new(db.clone(), tokens, validation_cache)
        .with_development(config.development);

    let shutdown = CancellationToken::new();
    let sweeper = TokenSweeper::new(db).with_schedule(
        Duration::from_secs(config.sweep_interval_secs),
        config.sweep_grace_secs,
    );
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown.clone()));

    let app = router(state);

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(host = %config.host, port = config.port, error = %e, "Invalid bind address");
            return ExitCode::FAILURE;
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "Failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    info!(%addr, "Luma server listening (docs at /docs)");

    let serve_result = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    shutdown.cancel();
    let _ = sweeper_handle.await;

    match serve_result {
        Ok(()) => {
            info!("Server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing subscriber, honoring `RUST_LOG` for filtering.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolve when the process receives SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
