//! Tag Service
//!
//! Tag writes cascade to translation links, so every tag write that may have
//! committed invalidates both the tag-filtered export tokens and the cached tag listing.

use polyglot_core::{EntityKind, PageRequest, Tag, TagFilter, TagId};
use polyglot_storage::cache::{LOCALES_CONTENT_KEY, TAGS_ALL_CONTENT_KEY};
use polyglot_storage::{FreshnessCache, InvalidationHook, TranslationStore};
use tracing::debug;

use super::{may_have_committed, record_invalidation};
use crate::error::{ApiError, ApiResult};
use crate::types::{ListTagsQuery, TagRequest};
use crate::validation::{validate_tag_name, MAX_LIST_PER_PAGE};

async fn after_commit(hook: &InvalidationHook) {
    let report = hook.tags_changed().await;
    debug!(
        tokens_cleared = report.tokens_cleared,
        content_cleared = report.content_cleared,
        failures = report.failures,
        "tag caches invalidated"
    );
    record_invalidation(EntityKind::Tag, &report);
}

pub async fn create_tag(
    store: &dyn TranslationStore,
    hook: &InvalidationHook,
    req: TagRequest,
) -> ApiResult<Tag> {
    let name = validate_tag_name(&req.name)?;
    let result = store.tag_create(&name).await;
    if result.as_ref().map_or_else(may_have_committed, |_| true) {
        after_commit(hook).await;
    }
    Ok(result?)
}

/// Rename a tag.
pub async fn update_tag(
    store: &dyn TranslationStore,
    hook: &InvalidationHook,
    id: TagId,
    req: TagRequest,
) -> ApiResult<Tag> {
    let name = validate_tag_name(&req.name)?;
    let result = store.tag_update(id, &name).await;
    if result
        .as_ref()
        .map_or_else(may_have_committed, |tag| tag.is_some())
    {
        after_commit(hook).await;
    }
    result?.ok_or_else(|| ApiError::tag_not_found(id))
}

/// Delete a tag and its translation links.
pub async fn delete_tag(
    store: &dyn TranslationStore,
    hook: &InvalidationHook,
    id: TagId,
) -> ApiResult<()> {
    let result = store.tag_delete(id).await;
    if result.as_ref().map_or_else(may_have_committed, |deleted| *deleted) {
        after_commit(hook).await;
    }
    if !result? {
        return Err(ApiError::tag_not_found(id));
    }
    Ok(())
}

pub fn tag_filter(query: &ListTagsQuery) -> (TagFilter, PageRequest) {
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    (
        TagFilter { search },
        PageRequest::new(query.page, query.per_page, MAX_LIST_PER_PAGE),
    )
}

/// Every tag by name, served from the content cache when present.
pub async fn all_tags(store: &dyn TranslationStore, cache: &FreshnessCache) -> ApiResult<Vec<Tag>> {
    if let Some(tags) = cache.get_content::<Vec<Tag>>(TAGS_ALL_CONTENT_KEY).await {
        return Ok(tags);
    }
    let tags = store.tag_all().await?;
    cache
        .put_content(TAGS_ALL_CONTENT_KEY, &tags, cache.config().tags_ttl)
        .await;
    Ok(tags)
}

/// Distinct locales, served from the content cache when present.
pub async fn all_locales(
    store: &dyn TranslationStore,
    cache: &FreshnessCache,
) -> ApiResult<Vec<String>> {
    if let Some(locales) = cache.get_content::<Vec<String>>(LOCALES_CONTENT_KEY).await {
        return Ok(locales);
    }
    let locales = store.locales_distinct().await?;
    cache
        .put_content(LOCALES_CONTENT_KEY, &locales, cache.config().locales_ttl)
        .await;
    Ok(locales)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use polyglot_core::{EntityIdType, ExportShape};
    use polyglot_storage::{CacheConfig, InMemoryCacheBackend, InMemoryStore, SharedStore};
    use polyglot_test_utils::fixtures::{grouping_rows, store_with_rows};
    use polyglot_test_utils::{CountingStore, LostReplyStore};
    use std::sync::Arc;

    fn cache() -> Arc<FreshnessCache> {
        Arc::new(FreshnessCache::new(
            Arc::new(InMemoryCacheBackend::new()),
            CacheConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_all_tags_is_cached_until_tag_write() -> ApiResult<()> {
        let inner = store_with_rows(&grouping_rows()).await;
        let counting = Arc::new(CountingStore::new(inner));
        let store: SharedStore = counting.clone();
        let cache = cache();
        let hook = InvalidationHook::new(store.clone(), cache.clone());

        let first = all_tags(store.as_ref(), &cache).await?;
        let second = all_tags(store.as_ref(), &cache).await?;
        assert_eq!(first, second);
        assert_eq!(counting.tag_all_calls(), 1);

        create_tag(
            store.as_ref(),
            &hook,
            TagRequest {
                name: "desktop".to_string(),
            },
        )
        .await?;
        let third = all_tags(store.as_ref(), &cache).await?;
        assert_eq!(third.len(), first.len() + 1);
        assert_eq!(counting.tag_all_calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_tag_rename_with_lost_reply_still_invalidates() -> ApiResult<()> {
        let store: SharedStore = store_with_rows(&grouping_rows()).await;
        let cache = cache();
        let hook = InvalidationHook::new(store.clone(), cache.clone());
        let lossy = LostReplyStore::new(store.clone());

        let web = store
            .tag_all()
            .await?
            .into_iter()
            .find(|t| t.name == "web")
            .ok_or_else(|| ApiError::internal_error("missing tag"))?;
        let before = cache.ensure_token(&ExportShape::All).await;
        assert!(before.is_some());

        let req = TagRequest {
            name: "browser".to_string(),
        };
        assert!(update_tag(&lossy, &hook, web.id, req).await.is_err());
        assert_eq!(
            store.tag_get(web.id).await?.map(|t| t.name).as_deref(),
            Some("browser")
        );
        assert!(cache.get_token(&ExportShape::All).await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_tag_delete_invalidates_tag_exports() -> ApiResult<()> {
        let store: SharedStore = store_with_rows(&grouping_rows()).await;
        let cache = cache();
        let hook = InvalidationHook::new(store.clone(), cache.clone());

        let shape = ExportShape::tags(["web"], None).ok_or_else(|| ApiError::internal_error("shape"))?;
        let before = cache.ensure_token(&shape).await;
        assert!(before.is_some());

        let web = store
            .tag_all()
            .await?
            .into_iter()
            .find(|t| t.name == "web")
            .ok_or_else(|| ApiError::internal_error("missing tag"))?;
        delete_tag(store.as_ref(), &hook, web.id).await?;

        assert_ne!(cache.get_token(&shape).await, before);
        Ok(())
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let cache = cache();
        let hook = InvalidationHook::new(store.clone(), cache);
        let err = create_tag(
            store.as_ref(),
            &hook,
            TagRequest {
                name: "   ".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingField);
    }

    #[tokio::test]
    async fn test_rename_missing_tag_is_not_found() {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let hook = InvalidationHook::new(store.clone(), cache());
        let err = update_tag(
            store.as_ref(),
            &hook,
            TagId::new(42),
            TagRequest {
                name: "web".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::TagNotFound);
    }
}
