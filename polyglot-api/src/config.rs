//! API Configuration Module
//!
//! Configuration for the HTTP surface, export streaming, and the cache layer.
//! Loaded from environment variables with sensible defaults for development.

use std::path::PathBuf;
use std::time::Duration;

use polyglot_export::DEFAULT_CHUNK_SIZE;

/// Smallest accepted export chunk size.
pub const MIN_EXPORT_CHUNK_SIZE: usize = 100;

/// Largest accepted export chunk size.
pub const MAX_EXPORT_CHUNK_SIZE: usize = 5000;

/// Which record store the server runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Postgres,
    /// Volatile in-process store, for local development and demos.
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "memory" | "in-memory" => StoreBackend::Memory,
            _ => StoreBackend::Postgres,
        })
    }
}

/// Which cache backend holds freshness tokens and content caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackendKind {
    #[default]
    Memory,
    /// Memory-mapped LMDB file; tokens survive restarts.
    Lmdb,
}

impl std::str::FromStr for CacheBackendKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "lmdb" => CacheBackendKind::Lmdb,
            _ => CacheBackendKind::Memory,
        })
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // Server
    // ========================================================================
    /// Bind host.
    pub bind_host: String,

    /// Bind port.
    pub port: u16,

    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Export and cache
    // ========================================================================
    /// Rows fetched per export chunk.
    pub export_chunk_size: usize,

    /// TTL of the cached full tag listing.
    pub tags_cache_ttl: Duration,

    /// TTL of the cached locale listing.
    pub locales_cache_ttl: Duration,

    pub store_backend: StoreBackend,

    pub cache_backend: CacheBackendKind,

    /// Directory of the LMDB environment.
    pub lmdb_path: PathBuf,

    /// LMDB map size in megabytes.
    pub lmdb_max_size_mb: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,
            export_chunk_size: DEFAULT_CHUNK_SIZE,
            tags_cache_ttl: Duration::from_secs(600),
            locales_cache_ttl: Duration::from_secs(60),
            store_backend: StoreBackend::default(),
            cache_backend: CacheBackendKind::default(),
            lmdb_path: PathBuf::from("./data/cache"),
            lmdb_max_size_mb: 256,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `POLYGLOT_API_BIND`: Bind host (default: 0.0.0.0)
    /// - `PORT` / `POLYGLOT_API_PORT`: Bind port (default: 3000)
    /// - `POLYGLOT_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `POLYGLOT_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `POLYGLOT_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `POLYGLOT_EXPORT_CHUNK_SIZE`: Rows per export chunk, clamped to 100..=5000 (default: 1000)
    /// - `POLYGLOT_TAGS_CACHE_TTL_SECS`: Tag listing TTL (default: 600)
    /// - `POLYGLOT_LOCALES_CACHE_TTL_SECS`: Locale listing TTL (default: 60)
    /// - `POLYGLOT_STORE`: "postgres" or "memory" (default: postgres)
    /// - `POLYGLOT_CACHE_BACKEND`: "memory" or "lmdb" (default: memory)
    /// - `POLYGLOT_LMDB_PATH`: LMDB directory (default: ./data/cache)
    /// - `POLYGLOT_LMDB_MAX_SIZE_MB`: LMDB map size (default: 256)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_origins = std::env::var("POLYGLOT_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let port = env_parse("PORT")
            .or_else(|| env_parse("POLYGLOT_API_PORT"))
            .unwrap_or(defaults.port);

        Self {
            bind_host: std::env::var("POLYGLOT_API_BIND").unwrap_or(defaults.bind_host),
            port,
            cors_origins,
            cors_allow_credentials: std::env::var("POLYGLOT_CORS_ALLOW_CREDENTIALS")
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(false),
            cors_max_age_secs: env_parse("POLYGLOT_CORS_MAX_AGE_SECS")
                .unwrap_or(defaults.cors_max_age_secs),
            export_chunk_size: clamp_chunk_size(
                env_parse("POLYGLOT_EXPORT_CHUNK_SIZE").unwrap_or(defaults.export_chunk_size),
            ),
            tags_cache_ttl: env_parse("POLYGLOT_TAGS_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.tags_cache_ttl),
            locales_cache_ttl: env_parse("POLYGLOT_LOCALES_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.locales_cache_ttl),
            store_backend: env_parse("POLYGLOT_STORE").unwrap_or_default(),
            cache_backend: env_parse("POLYGLOT_CACHE_BACKEND").unwrap_or_default(),
            lmdb_path: std::env::var("POLYGLOT_LMDB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.lmdb_path),
            lmdb_max_size_mb: env_parse("POLYGLOT_LMDB_MAX_SIZE_MB")
                .unwrap_or(defaults.lmdb_max_size_mb),
        }
    }

    /// Check if running with strict CORS.
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // *.example.com
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(&format!(".{}", pattern));
                }
            }
            false
        })
    }
}

/// Clamp an export chunk size into the accepted range.
pub fn clamp_chunk_size(size: usize) -> usize {
    size.clamp(MIN_EXPORT_CHUNK_SIZE, MAX_EXPORT_CHUNK_SIZE)
}

/// Check if running in a production environment.
pub fn is_production_environment() -> bool {
    std::env::var("POLYGLOT_ENVIRONMENT")
        .map(|e| matches!(e.to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}
