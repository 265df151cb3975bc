//! Polyglot Storage - Record Store Traits and Cache Layer
//!
//! Defines the record store abstraction for translations and tags, an
//! in-memory implementation, and the freshness-token cache that fronts
//! exports. The Postgres implementation lives in polyglot-api.

pub mod cache;
pub mod memory;
pub mod store;

pub use cache::{
    CacheBackend, CacheConfig, CacheEntry, CacheStats, FreshnessCache, FreshnessToken, Generation,
    InMemoryCacheBackend, InvalidationHook, InvalidationReport, LmdbCacheBackend, LmdbCacheError,
    LocaleSweep, Retention, TokenKey,
};
pub use memory::InMemoryStore;
pub use store::{SharedStore, SharedUserStore, TranslationStore, UserStore};
