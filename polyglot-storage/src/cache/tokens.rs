//! Freshness tokens and short-lived content caches.
//!
//! A freshness token is an opaque random string that stands for "the export of
//! this shape as of the current generation". Tokens are minted lazily by the
//! first reader, kept until invalidated, and compared by exact equality.
//!
//! Cache failures never propagate: reads degrade to a miss and invalidation
//! steps are best effort. Both are logged and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use polyglot_core::{EntityKind, ExportShape, PolyglotError, PolyglotResult};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::keys::{Generation, TokenKey, GENERATION_KEY, LOCALES_CONTENT_KEY, TAGS_ALL_CONTENT_KEY};
use super::traits::{CacheBackend, CacheStats, Retention};

/// An opaque freshness token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FreshnessToken(String);

impl FreshnessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Mint a token from 128 random bits.
    pub fn generate() -> Self {
        Self(hex::encode(rand::random::<[u8; 16]>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Strong entity-tag form, e.g. `"3f2a..."`.
    pub fn to_etag(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

/// Retention settings for content caches.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL of the cached full tag listing.
    pub tags_ttl: Duration,
    /// TTL of the cached locale listing.
    pub locales_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tags_ttl: Duration::from_secs(600),
            locales_ttl: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    pub fn with_tags_ttl(mut self, ttl: Duration) -> Self {
        self.tags_ttl = ttl;
        self
    }

    pub fn with_locales_ttl(mut self, ttl: Duration) -> Self {
        self.locales_ttl = ttl;
        self
    }
}

/// Which per-locale token keys an invalidation must clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocaleSweep {
    /// Delete the token of each listed locale before the prefix sweep.
    Known(Vec<String>),
    /// Locales are unknown; rely on the per-locale prefix sweep alone.
    Prefix,
}

/// Outcome of one invalidation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Generation that became current, if the counter could be bumped.
    pub generation: Option<Generation>,
    /// Token keys removed.
    pub tokens_cleared: u64,
    /// Content cache keys removed.
    pub content_cleared: u64,
    /// Steps that failed against the backend.
    pub failures: u32,
}

impl InvalidationReport {
    fn absorb(&mut self, step: PolyglotResult<u64>, tokens: bool, what: &str) {
        match step {
            Ok(n) if tokens => self.tokens_cleared += n,
            Ok(n) => self.content_cleared += n,
            Err(e) => {
                self.failures += 1;
                warn!(error = %e, step = what, "cache invalidation step failed");
            }
        }
    }
}

/// Freshness-token cache over a pluggable backend.
pub struct FreshnessCache {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
    degraded: AtomicU64,
}

impl FreshnessCache {
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self {
            backend,
            config,
            degraded: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of operations that fell back because the backend failed.
    pub fn degraded_operations(&self) -> u64 {
        self.degraded.load(Ordering::Relaxed)
    }

    pub async fn stats(&self) -> PolyglotResult<CacheStats> {
        self.backend.stats().await
    }

    fn degrade(&self, error: &PolyglotError, operation: &'static str) {
        self.degraded.fetch_add(1, Ordering::Relaxed);
        warn!(error = %error, operation, "cache backend failed; treating as miss");
    }

    /// Current generation. Absent counter means generation zero.
    pub async fn generation(&self) -> PolyglotResult<Generation> {
        match self.backend.get(GENERATION_KEY).await? {
            Some(entry) => entry.value.parse::<u64>().map(Generation::new).map_err(|e| {
                polyglot_core::CacheError::Corrupt {
                    key: GENERATION_KEY.to_string(),
                    reason: e.to_string(),
                }
                .into()
            }),
            None => Ok(Generation::default()),
        }
    }

    /// Stored token for `shape` in the current generation, if any.
    pub async fn get_token(&self, shape: &ExportShape) -> Option<FreshnessToken> {
        let generation = match self.generation().await {
            Ok(g) => g,
            Err(e) => {
                self.degrade(&e, "get_token");
                return None;
            }
        };
        let key = TokenKey::new(generation, shape).encode();
        match self.backend.get(&key).await {
            Ok(entry) => entry.map(|e| FreshnessToken(e.value)),
            Err(e) => {
                self.degrade(&e, "get_token");
                None
            }
        }
    }

    /// Token for `shape`, minting and storing one if absent.
    ///
    /// Concurrent callers converge on the first stored token. Returns `None`
    /// only when the backend is unavailable.
    pub async fn ensure_token(&self, shape: &ExportShape) -> Option<FreshnessToken> {
        let generation = match self.generation().await {
            Ok(g) => g,
            Err(e) => {
                self.degrade(&e, "ensure_token");
                return None;
            }
        };
        let key = TokenKey::new(generation, shape).encode();
        let candidate = FreshnessToken::generate();
        match self.backend.add(&key, candidate.as_str(), Retention::Forever).await {
            Ok(stored) => {
                if stored == candidate.0 {
                    debug!(%generation, shape = shape.kind(), "minted freshness token");
                }
                Some(FreshnessToken(stored))
            }
            Err(e) => {
                self.degrade(&e, "ensure_token");
                None
            }
        }
    }

    /// Drop the current-generation token of one shape.
    pub async fn invalidate(&self, shape: &ExportShape) -> bool {
        let result = async {
            let generation = self.generation().await?;
            self.backend
                .delete(&TokenKey::new(generation, shape).encode())
                .await
        }
        .await;
        match result {
            Ok(deleted) => deleted,
            Err(e) => {
                self.degrade(&e, "invalidate");
                false
            }
        }
    }

    /// Clear every cached view a write of `kind` can affect.
    ///
    /// Translation writes bump the generation, then delete the previous
    /// generation's tokens: the global token, the per-locale tokens (the
    /// listed `locales` first, then a prefix sweep for locales without rows),
    /// every tag-filtered token, and the locales token. The locale listing is
    /// dropped as well. Tag writes also clear the tag listing first.
    ///
    /// If the generation cannot be bumped, the current generation's tokens
    /// are deleted in place instead.
    pub async fn invalidate_all_for(&self, kind: EntityKind, locales: LocaleSweep) -> InvalidationReport {
        let mut report = InvalidationReport::default();

        if kind == EntityKind::Tag {
            report.absorb(
                self.backend.delete(TAGS_ALL_CONTENT_KEY).await.map(u64::from),
                false,
                "tags_content",
            );
        }

        match self.backend.increment(GENERATION_KEY).await {
            Ok(value) => {
                let new_generation = Generation::new(value);
                report.generation = Some(new_generation);
                if let Some(old) = new_generation.previous() {
                    self.sweep_generation(old, &locales, &mut report).await;
                }
            }
            Err(e) => {
                report.failures += 1;
                warn!(error = %e, "failed to advance token generation; clearing current tokens");
                match self.generation().await {
                    Ok(current) => self.sweep_generation(current, &locales, &mut report).await,
                    Err(e) => report.absorb(Err(e), true, "current_generation"),
                }
            }
        }

        report.absorb(
            self.backend.delete(LOCALES_CONTENT_KEY).await.map(u64::from),
            false,
            "locales_content",
        );

        debug!(
            kind = ?kind,
            generation = ?report.generation.map(|g| g.value()),
            tokens_cleared = report.tokens_cleared,
            content_cleared = report.content_cleared,
            failures = report.failures,
            "cache invalidated"
        );
        report
    }

    /// Delete every token stored under `generation`.
    async fn sweep_generation(
        &self,
        generation: Generation,
        locales: &LocaleSweep,
        report: &mut InvalidationReport,
    ) {
        report.absorb(
            self.backend
                .delete(&TokenKey::new(generation, &ExportShape::All).encode())
                .await
                .map(u64::from),
            true,
            "all_token",
        );
        if let LocaleSweep::Known(locales) = locales {
            for locale in locales {
                report.absorb(
                    self.backend
                        .delete(&TokenKey::for_locale(generation, locale).encode())
                        .await
                        .map(u64::from),
                    true,
                    "locale_token",
                );
            }
        }
        // Locales without rows still get tokens from public exports.
        report.absorb(
            self.backend
                .delete_prefix(&TokenKey::locale_prefix(generation))
                .await,
            true,
            "locale_prefix",
        );
        report.absorb(
            self.backend.delete_prefix(&TokenKey::tags_prefix(generation)).await,
            true,
            "tags_prefix",
        );
        report.absorb(
            self.backend
                .delete(&TokenKey::new(generation, &ExportShape::Locales).encode())
                .await
                .map(u64::from),
            true,
            "locales_token",
        );
    }

    /// Read a JSON content cache entry.
    pub async fn get_content<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = match self.backend.get(key).await {
            Ok(entry) => entry?,
            Err(e) => {
                self.degrade(&e, "get_content");
                return None;
            }
        };
        match serde_json::from_str(&entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, key, "discarding undecodable content cache entry");
                None
            }
        }
    }

    /// Write a JSON content cache entry with a TTL.
    pub async fn put_content<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(error = %e, key, "failed to encode content cache entry");
                return;
            }
        };
        if let Err(e) = self.backend.set(key, &encoded, Retention::Ttl(ttl)).await {
            self.degrade(&e, "put_content");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryCacheBackend;
    use crate::cache::traits::CacheEntry;
    use async_trait::async_trait;
    use polyglot_core::CacheError;

    struct DownBackend;

    fn down() -> PolyglotError {
        CacheError::Unavailable {
            reason: "connection refused".to_string(),
        }
        .into()
    }

    #[async_trait]
    impl CacheBackend for DownBackend {
        async fn get(&self, _key: &str) -> PolyglotResult<Option<CacheEntry>> {
            Err(down())
        }
        async fn set(&self, _key: &str, _value: &str, _r: Retention) -> PolyglotResult<()> {
            Err(down())
        }
        async fn add(&self, _key: &str, _value: &str, _r: Retention) -> PolyglotResult<String> {
            Err(down())
        }
        async fn delete(&self, _key: &str) -> PolyglotResult<bool> {
            Err(down())
        }
        async fn delete_prefix(&self, _prefix: &str) -> PolyglotResult<u64> {
            Err(down())
        }
        async fn increment(&self, _key: &str) -> PolyglotResult<u64> {
            Err(down())
        }
        async fn stats(&self) -> PolyglotResult<CacheStats> {
            Err(down())
        }
    }

    fn cache() -> FreshnessCache {
        FreshnessCache::new(Arc::new(InMemoryCacheBackend::new()), CacheConfig::default())
    }

    #[tokio::test]
    async fn test_ensure_token_is_stable_until_invalidated() {
        let cache = cache();
        let shape = ExportShape::locale("en");
        assert!(cache.get_token(&shape).await.is_none());

        let first = cache.ensure_token(&shape).await.unwrap();
        let second = cache.ensure_token(&shape).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.get_token(&shape).await, Some(first.clone()));

        cache
            .invalidate_all_for(EntityKind::Translation, LocaleSweep::Known(vec!["en".into()]))
            .await;
        assert!(cache.get_token(&shape).await.is_none());
        let third = cache.ensure_token(&shape).await.unwrap();
        assert_ne!(first, third);
    }

    #[tokio::test]
    async fn test_token_is_128_bit_hex() {
        let token = FreshnessToken::generate();
        assert_eq!(token.as_str().len(), 32);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(token.to_etag(), format!("\"{}\"", token.as_str()));
    }

    #[tokio::test]
    async fn test_invalidation_clears_every_shape() {
        let cache = cache();
        let shapes = vec![
            ExportShape::All,
            ExportShape::locale("en"),
            ExportShape::locale("fr"),
            ExportShape::tags(["web"], None).unwrap(),
            ExportShape::tags(["web", "mobile"], Some("fr".into())).unwrap(),
            ExportShape::Locales,
        ];
        for shape in &shapes {
            cache.ensure_token(shape).await.unwrap();
        }

        let report = cache
            .invalidate_all_for(
                EntityKind::Translation,
                LocaleSweep::Known(vec!["en".into(), "fr".into()]),
            )
            .await;
        assert_eq!(report.generation, Some(Generation::new(1)));
        assert_eq!(report.tokens_cleared, 6);
        assert_eq!(report.failures, 0);
        for shape in &shapes {
            assert!(cache.get_token(shape).await.is_none(), "{shape:?} survived");
        }
    }

    #[tokio::test]
    async fn test_prefix_sweep_when_locales_unknown() {
        let cache = cache();
        cache.ensure_token(&ExportShape::locale("de")).await.unwrap();
        let report = cache
            .invalidate_all_for(EntityKind::Translation, LocaleSweep::Prefix)
            .await;
        assert_eq!(report.tokens_cleared, 1);
    }

    #[tokio::test]
    async fn test_stale_reader_cannot_resurrect_token() {
        // A reader that minted a token under the old generation after the
        // writer's deletes ran leaves an orphan the new generation never reads.
        let backend = Arc::new(InMemoryCacheBackend::new());
        let cache = FreshnessCache::new(backend.clone(), CacheConfig::default());
        let shape = ExportShape::locale("en");

        let old = cache.generation().await.unwrap();
        cache
            .invalidate_all_for(EntityKind::Translation, LocaleSweep::Known(vec!["en".into()]))
            .await;
        backend
            .add(&TokenKey::new(old, &shape).encode(), "stale", Retention::Forever)
            .await
            .unwrap();

        let current = cache.ensure_token(&shape).await.unwrap();
        assert_ne!(current.as_str(), "stale");
    }

    #[tokio::test]
    async fn test_tag_kind_clears_tag_listing() {
        let cache = cache();
        cache
            .put_content(TAGS_ALL_CONTENT_KEY, &vec!["web"], Duration::from_secs(60))
            .await;
        assert_eq!(
            cache.get_content::<Vec<String>>(TAGS_ALL_CONTENT_KEY).await,
            Some(vec!["web".to_string()])
        );
        let report = cache
            .invalidate_all_for(EntityKind::Tag, LocaleSweep::Known(vec![]))
            .await;
        assert_eq!(report.content_cleared, 1);
        assert!(cache
            .get_content::<Vec<String>>(TAGS_ALL_CONTENT_KEY)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_backend_down_degrades_to_miss() {
        let cache = FreshnessCache::new(Arc::new(DownBackend), CacheConfig::default());
        let shape = ExportShape::All;
        assert!(cache.get_token(&shape).await.is_none());
        assert!(cache.ensure_token(&shape).await.is_none());
        assert!(!cache.invalidate(&shape).await);
        assert!(cache.get_content::<Vec<String>>("content:locales").await.is_none());
        cache
            .put_content("content:locales", &vec!["en"], Duration::from_secs(1))
            .await;

        let report = cache
            .invalidate_all_for(EntityKind::Translation, LocaleSweep::Prefix)
            .await;
        assert_eq!(report.generation, None);
        // increment, the current-generation read, and the locale listing
        assert_eq!(report.failures, 3);
        assert_eq!(cache.degraded_operations(), 5);
    }

    /// Delegates to memory but refuses to advance the generation.
    struct StuckCounter(InMemoryCacheBackend);

    #[async_trait]
    impl CacheBackend for StuckCounter {
        async fn get(&self, key: &str) -> PolyglotResult<Option<CacheEntry>> {
            self.0.get(key).await
        }
        async fn set(&self, key: &str, value: &str, r: Retention) -> PolyglotResult<()> {
            self.0.set(key, value, r).await
        }
        async fn add(&self, key: &str, value: &str, r: Retention) -> PolyglotResult<String> {
            self.0.add(key, value, r).await
        }
        async fn delete(&self, key: &str) -> PolyglotResult<bool> {
            self.0.delete(key).await
        }
        async fn delete_prefix(&self, prefix: &str) -> PolyglotResult<u64> {
            self.0.delete_prefix(prefix).await
        }
        async fn increment(&self, _key: &str) -> PolyglotResult<u64> {
            Err(down())
        }
        async fn stats(&self) -> PolyglotResult<CacheStats> {
            self.0.stats().await
        }
    }

    #[tokio::test]
    async fn test_failed_generation_bump_clears_current_tokens() {
        let cache = FreshnessCache::new(
            Arc::new(StuckCounter(InMemoryCacheBackend::new())),
            CacheConfig::default(),
        );
        let shapes = vec![
            ExportShape::All,
            ExportShape::locale("en"),
            ExportShape::tags(["web"], None).unwrap(),
            ExportShape::Locales,
        ];
        for shape in &shapes {
            cache.ensure_token(shape).await.unwrap();
        }

        let report = cache
            .invalidate_all_for(EntityKind::Translation, LocaleSweep::Known(vec![]))
            .await;
        assert_eq!(report.generation, None);
        assert_eq!(report.failures, 1);
        assert_eq!(report.tokens_cleared, 4);
        for shape in &shapes {
            assert!(cache.get_token(shape).await.is_none(), "{shape:?} survived");
        }
    }

    #[tokio::test]
    async fn test_known_sweep_still_clears_rowless_locales() {
        let cache = cache();
        cache.ensure_token(&ExportShape::locale("en")).await.unwrap();
        cache.ensure_token(&ExportShape::locale("xx")).await.unwrap();

        let report = cache
            .invalidate_all_for(EntityKind::Translation, LocaleSweep::Known(vec!["en".into()]))
            .await;
        assert_eq!(report.tokens_cleared, 2);
        let stats = cache.stats().await.unwrap();
        // only the generation counter remains
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test]
    async fn test_invalidate_single_shape() {
        let cache = cache();
        let shape = ExportShape::locale("en");
        cache.ensure_token(&shape).await.unwrap();
        assert!(cache.invalidate(&shape).await);
        assert!(cache.get_token(&shape).await.is_none());
    }
}
