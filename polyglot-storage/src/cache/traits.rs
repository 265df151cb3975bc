//! Cache backend trait and statistics.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use polyglot_core::PolyglotResult;
use std::time::Duration;

/// How long an entry may live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Kept until explicitly deleted. Used for freshness tokens.
    Forever,
    /// Silently expires after the given duration. Used for content listings.
    Ttl(Duration),
}

impl Retention {
    /// Absolute expiry for an entry written at `now`.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Forever => None,
            Self::Ttl(ttl) => {
                let ttl = chrono::Duration::from_std(*ttl).unwrap_or(chrono::Duration::MAX);
                Some(now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC))
            }
        }
    }
}

/// A stored value with its bookkeeping timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub value: String,
    pub stored_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Cache backend trait for pluggable cache implementations.
///
/// Values are opaque strings. Every operation must be atomic with respect to
/// the others on the same key: `add` and `increment` in particular are used
/// to resolve races between concurrent requests without in-process locking.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get a live entry. Expired entries read as `None`.
    async fn get(&self, key: &str) -> PolyglotResult<Option<CacheEntry>>;

    /// Store a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str, retention: Retention) -> PolyglotResult<()>;

    /// Store `value` only if no live entry exists. Returns the value that ends
    /// up stored, which is the existing one when another writer got there first.
    async fn add(&self, key: &str, value: &str, retention: Retention) -> PolyglotResult<String>;

    /// Delete a key. Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> PolyglotResult<bool>;

    /// Delete every key starting with `prefix`. Returns the number removed.
    async fn delete_prefix(&self, prefix: &str) -> PolyglotResult<u64>;

    /// Atomically increment an integer counter stored at `key`, starting from 0.
    /// Returns the new value. Counters never expire.
    async fn increment(&self, key: &str) -> PolyglotResult<u64>;

    /// Get cache statistics.
    async fn stats(&self) -> PolyglotResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of entries dropped because their TTL elapsed.
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
