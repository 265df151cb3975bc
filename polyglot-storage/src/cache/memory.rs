//! Process-local cache backend.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use polyglot_core::{CacheError, PolyglotResult};

use super::traits::{CacheBackend, CacheEntry, CacheStats, Retention};

#[derive(Debug, Default)]
struct MemoryCacheInner {
    entries: BTreeMap<String, CacheEntry>,
    stats: CacheStats,
}

impl MemoryCacheInner {
    /// Live entry for `key`, dropping it first if it has expired.
    fn live(&mut self, key: &str) -> Option<&CacheEntry> {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(Utc::now()));
        if expired {
            self.entries.remove(key);
            self.stats.expirations += 1;
        }
        self.entries.get(key)
    }

    fn insert(&mut self, key: &str, value: String, retention: Retention) {
        let now = Utc::now();
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: now,
                expires_at: retention.expires_at(now),
            },
        );
    }
}

/// In-memory cache backend with lazy TTL expiry.
///
/// Suitable for single-process deployments and tests. Tokens do not survive a
/// restart, which is safe: a missing token only costs one regeneration.
#[derive(Debug, Default)]
pub struct InMemoryCacheBackend {
    inner: Mutex<MemoryCacheInner>,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PolyglotResult<std::sync::MutexGuard<'_, MemoryCacheInner>> {
        self.inner.lock().map_err(|_| {
            CacheError::Unavailable {
                reason: "cache lock poisoned".to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &str) -> PolyglotResult<Option<CacheEntry>> {
        let mut inner = self.lock()?;
        let found = inner.live(key).cloned();
        if found.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        Ok(found)
    }

    async fn set(&self, key: &str, value: &str, retention: Retention) -> PolyglotResult<()> {
        self.lock()?.insert(key, value.to_string(), retention);
        Ok(())
    }

    async fn add(&self, key: &str, value: &str, retention: Retention) -> PolyglotResult<String> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner.live(key) {
            return Ok(existing.value.clone());
        }
        inner.insert(key, value.to_string(), retention);
        Ok(value.to_string())
    }

    async fn delete(&self, key: &str) -> PolyglotResult<bool> {
        let mut inner = self.lock()?;
        let live = inner.live(key).is_some();
        inner.entries.remove(key);
        Ok(live)
    }

    async fn delete_prefix(&self, prefix: &str) -> PolyglotResult<u64> {
        let mut inner = self.lock()?;
        let keys: Vec<String> = inner
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &keys {
            inner.entries.remove(key);
        }
        Ok(keys.len() as u64)
    }

    async fn increment(&self, key: &str) -> PolyglotResult<u64> {
        let mut inner = self.lock()?;
        let current = match inner.live(key) {
            Some(entry) => entry.value.parse::<u64>().map_err(|e| CacheError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })?,
            None => 0,
        };
        let next = current + 1;
        inner.insert(key, next.to_string(), Retention::Forever);
        Ok(next)
    }

    async fn stats(&self) -> PolyglotResult<CacheStats> {
        let inner = self.lock()?;
        Ok(CacheStats {
            entry_count: inner.entries.len() as u64,
            ..inner.stats.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = InMemoryCacheBackend::new();
        cache.set("a", "1", Retention::Forever).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap().unwrap().value, "1");
        assert!(cache.delete("a").await.unwrap());
        assert!(!cache.delete("a").await.unwrap());
        assert!(cache.get("a").await.unwrap().is_none());

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_ttl_entries_expire() {
        let cache = InMemoryCacheBackend::new();
        cache
            .set("short", "v", Retention::Ttl(Duration::from_millis(0)))
            .await
            .unwrap();
        assert!(cache.get("short").await.unwrap().is_none());
        assert_eq!(cache.stats().await.unwrap().expirations, 1);
    }

    #[tokio::test]
    async fn test_add_first_writer_wins() {
        let cache = InMemoryCacheBackend::new();
        assert_eq!(cache.add("k", "first", Retention::Forever).await.unwrap(), "first");
        assert_eq!(cache.add("k", "second", Retention::Forever).await.unwrap(), "first");
    }

    #[tokio::test]
    async fn test_delete_prefix_only_matches_prefix() {
        let cache = InMemoryCacheBackend::new();
        for key in ["etag:g1:tags:a", "etag:g1:tags:b", "etag:g1:all", "etag:g2:tags:a"] {
            cache.set(key, "t", Retention::Forever).await.unwrap();
        }
        assert_eq!(cache.delete_prefix("etag:g1:tags:").await.unwrap(), 2);
        assert!(cache.get("etag:g1:all").await.unwrap().is_some());
        assert!(cache.get("etag:g2:tags:a").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increment_is_atomic() {
        let cache = Arc::new(InMemoryCacheBackend::new());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.increment("gen").await.unwrap() }));
        }
        let mut seen = Vec::new();
        for handle in handles {
            seen.push(handle.await.unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (1..=50).collect::<Vec<u64>>());
    }
}
