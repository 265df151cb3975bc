//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use polyglot_export::{ExportConfig, ExportEngine};
use polyglot_storage::{
    CacheBackend, CacheConfig, FreshnessCache, InvalidationHook, SharedStore, SharedUserStore,
};

use crate::auth::AuthConfig;
use crate::config::ApiConfig;
use crate::middleware::AuthMiddlewareState;

/// Application-wide state shared across all routes.
///
/// The freshness cache is owned here and handed to every component that
/// needs it; nothing reaches it through a global.
#[derive(Clone)]
pub struct AppState {
    /// Record store for translations and tags.
    pub store: SharedStore,
    /// Credential store consulted by login.
    pub users: SharedUserStore,
    /// Freshness tokens and content caches.
    pub cache: Arc<FreshnessCache>,
    /// Post-commit invalidation, called by the write services.
    pub hook: InvalidationHook,
    pub exports: ExportEngine,
    pub auth: AuthMiddlewareState,
    pub config: Arc<ApiConfig>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the state from its collaborators.
    pub fn new(
        store: SharedStore,
        users: SharedUserStore,
        cache_backend: Arc<dyn CacheBackend>,
        api_config: ApiConfig,
        auth_config: AuthConfig,
    ) -> Self {
        let cache_config = CacheConfig::default()
            .with_tags_ttl(api_config.tags_cache_ttl)
            .with_locales_ttl(api_config.locales_cache_ttl);
        let cache = Arc::new(FreshnessCache::new(cache_backend, cache_config));
        let hook = InvalidationHook::new(store.clone(), cache.clone());
        let exports = ExportEngine::new(
            store.clone(),
            ExportConfig::default().with_chunk_size(api_config.export_chunk_size),
        );

        Self {
            store,
            users,
            cache,
            hook,
            exports,
            auth: AuthMiddlewareState::new(auth_config),
            config: Arc::new(api_config),
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(SharedStore, store);
crate::impl_from_ref!(SharedUserStore, users);
crate::impl_from_ref!(Arc<FreshnessCache>, cache);
crate::impl_from_ref!(InvalidationHook, hook);
crate::impl_from_ref!(ExportEngine, exports);
crate::impl_from_ref!(AuthMiddlewareState, auth);
crate::impl_from_ref!(Arc<ApiConfig>, config);
crate::impl_from_ref!(Instant, start_time);
