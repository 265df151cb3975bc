//! Post-commit invalidation hook.
//!
//! Write paths call the hook after their store write has committed. The hook
//! resolves which locales are present and hands off to
//! [`FreshnessCache::invalidate_all_for`]. It never fails the write.

use std::sync::Arc;

use polyglot_core::EntityKind;
use tracing::warn;

use super::tokens::{FreshnessCache, InvalidationReport, LocaleSweep};
use crate::store::SharedStore;

#[derive(Clone)]
pub struct InvalidationHook {
    store: SharedStore,
    cache: Arc<FreshnessCache>,
}

impl InvalidationHook {
    pub fn new(store: SharedStore, cache: Arc<FreshnessCache>) -> Self {
        Self { store, cache }
    }

    /// Run after a translation create, update, or delete has committed.
    pub async fn translations_changed(&self) -> InvalidationReport {
        self.run(EntityKind::Translation).await
    }

    /// Run after a tag create, update, or delete has committed.
    pub async fn tags_changed(&self) -> InvalidationReport {
        self.run(EntityKind::Tag).await
    }

    async fn run(&self, kind: EntityKind) -> InvalidationReport {
        let sweep = match self.store.locales_distinct().await {
            Ok(locales) => LocaleSweep::Known(locales),
            Err(e) => {
                warn!(error = %e, "could not list locales; sweeping locale token prefix");
                LocaleSweep::Prefix
            }
        };
        self.cache.invalidate_all_for(kind, sweep).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryCacheBackend;
    use crate::cache::tokens::CacheConfig;
    use crate::memory::InMemoryStore;
    use crate::store::TranslationStore;
    use polyglot_core::{ExportShape, NewTranslation};

    async fn setup() -> (Arc<InMemoryStore>, Arc<FreshnessCache>, InvalidationHook) {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(FreshnessCache::new(
            Arc::new(InMemoryCacheBackend::new()),
            CacheConfig::default(),
        ));
        let hook = InvalidationHook::new(store.clone(), cache.clone());
        (store, cache, hook)
    }

    #[tokio::test]
    async fn test_translation_write_clears_all_locale_tokens() {
        let (store, cache, hook) = setup().await;
        for (key, locale) in [("a", "en"), ("a", "fr")] {
            store
                .translation_create(NewTranslation {
                    key: key.to_string(),
                    locale: locale.to_string(),
                    value: "v".to_string(),
                    tags: vec![],
                })
                .await
                .unwrap();
        }
        let en = cache.ensure_token(&ExportShape::locale("en")).await.unwrap();
        cache.ensure_token(&ExportShape::locale("fr")).await.unwrap();

        let report = hook.translations_changed().await;
        assert_eq!(report.tokens_cleared, 2);
        assert!(cache.get_token(&ExportShape::locale("fr")).await.is_none());
        assert_ne!(
            cache.ensure_token(&ExportShape::locale("en")).await.unwrap(),
            en
        );
    }

    #[tokio::test]
    async fn test_cache_stays_bounded_across_writes() {
        let (store, cache, hook) = setup().await;
        store
            .translation_create(NewTranslation {
                key: "a".to_string(),
                locale: "en".to_string(),
                value: "v".to_string(),
                tags: vec![],
            })
            .await
            .unwrap();

        for round in 0..50 {
            cache
                .ensure_token(&ExportShape::locale(format!("x{}", round % 5)))
                .await
                .unwrap();
            cache.ensure_token(&ExportShape::locale("en")).await.unwrap();
            hook.translations_changed().await;
        }

        let stats = cache.stats().await.unwrap();
        assert!(stats.entry_count <= 3, "{} entries left", stats.entry_count);
    }

    #[tokio::test]
    async fn test_tag_write_cascades_into_translation_tokens() {
        let (_store, cache, hook) = setup().await;
        cache.ensure_token(&ExportShape::All).await.unwrap();
        let report = hook.tags_changed().await;
        assert_eq!(report.generation.map(|g| g.value()), Some(1));
        assert!(cache.get_token(&ExportShape::All).await.is_none());
    }
}
