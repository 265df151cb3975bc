//! Polyglot API Server Entry Point
//!
//! Bootstraps configuration, selects the record store and cache backend, and
//! starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use polyglot_api::{
    create_api_router, ApiConfig, ApiError, ApiResult, AppState, AuthConfig, CacheBackendKind,
    DbConfig, PgStore, StoreBackend,
};
use polyglot_api::telemetry::{init_tracing, TelemetryConfig};
use polyglot_storage::{
    CacheBackend, InMemoryCacheBackend, InMemoryStore, LmdbCacheBackend, SharedStore,
    SharedUserStore,
};

/// How often expired entries are dropped from the token revocation list.
const REVOCATION_PURGE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env();
    let auth_config = AuthConfig::from_env();

    let (store, users) = open_store(&api_config).await?;
    let cache_backend = open_cache(&api_config)?;

    let state = AppState::new(store, users, cache_backend, api_config, auth_config);
    spawn_revocation_purge(&state);

    let addr = resolve_bind_addr(&state.config)?;
    let app: Router = create_api_router(state)?;

    tracing::info!(%addr, "Starting Polyglot API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

async fn open_store(config: &ApiConfig) -> ApiResult<(SharedStore, SharedUserStore)> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on exit");
            let memory = Arc::new(InMemoryStore::new());
            let store: SharedStore = memory.clone();
            let users: SharedUserStore = memory;
            Ok((store, users))
        }
        StoreBackend::Postgres => {
            let db_config = DbConfig::from_env();
            let pg = Arc::new(PgStore::from_config(&db_config)?);
            if db_config.migrate {
                pg.migrate().await?;
            }
            tracing::info!(
                host = %db_config.host,
                dbname = %db_config.dbname,
                pool_max = db_config.max_size,
                "Connected to Postgres"
            );
            let store: SharedStore = pg.clone();
            let users: SharedUserStore = pg;
            Ok((store, users))
        }
    }
}

fn open_cache(config: &ApiConfig) -> ApiResult<Arc<dyn CacheBackend>> {
    match config.cache_backend {
        CacheBackendKind::Memory => Ok(Arc::new(InMemoryCacheBackend::new())),
        CacheBackendKind::Lmdb => {
            let backend = LmdbCacheBackend::new(&config.lmdb_path, config.lmdb_max_size_mb)
                .map_err(|e| {
                    ApiError::internal_error(format!("Failed to open LMDB cache: {}", e))
                })?;
            tracing::info!(path = %config.lmdb_path.display(), "Using LMDB cache backend");
            Ok(Arc::new(backend))
        }
    }
}

fn spawn_revocation_purge(state: &AppState) {
    let auth = state.auth.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REVOCATION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let now = auth.auth_config.clock.now_epoch_secs();
            let purged = auth.revocations.purge_expired(now);
            if purged > 0 {
                tracing::debug!(purged, "Purged expired token revocations");
            }
        }
    });
}

fn resolve_bind_addr(config: &ApiConfig) -> ApiResult<SocketAddr> {
    let addr = format!("{}:{}", config.bind_host, config.port);
    addr.parse::<SocketAddr>().map_err(|e| {
        ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e))
    })
}
