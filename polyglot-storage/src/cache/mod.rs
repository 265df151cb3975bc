//! Cache layer: freshness tokens, content caches, and invalidation.
//!
//! Two retention classes share one backend. Content caches (tag and locale
//! listings) carry a short TTL and may expire at any time. Freshness tokens
//! never time out; they disappear only through invalidation.
//!
//! Token keys embed a generation counter that every translation-affecting
//! write bumps after its commit. A reader that snapshotted the old generation
//! can only ever write an old-generation key, which no later reader consults,
//! so a token can lag a commit but never get ahead of one.
//!
//! ```ignore
//! let cache = FreshnessCache::new(Arc::new(InMemoryCacheBackend::new()), CacheConfig::default());
//! let token = cache.ensure_token(&ExportShape::locale("en")).await;
//! hook.translations_changed().await; // token is now unreachable
//! ```

pub mod invalidation;
pub mod keys;
pub mod lmdb_backend;
pub mod memory;
pub mod tokens;
pub mod traits;

pub use invalidation::InvalidationHook;
pub use keys::{Generation, TokenKey, GENERATION_KEY, LOCALES_CONTENT_KEY, TAGS_ALL_CONTENT_KEY};
pub use lmdb_backend::{LmdbCacheBackend, LmdbCacheError};
pub use memory::InMemoryCacheBackend;
pub use tokens::{CacheConfig, FreshnessCache, FreshnessToken, InvalidationReport, LocaleSweep};
pub use traits::{CacheBackend, CacheEntry, CacheStats, Retention};
