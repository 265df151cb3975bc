//! Translation Service
//!
//! Validation, persistence, and post-commit invalidation for translations.

use polyglot_core::{
    EntityKind, NewTranslation, PageRequest, TranslationFilter, TranslationId, TranslationPatch,
    TranslationWithTags,
};
use polyglot_storage::{InvalidationHook, TranslationStore};
use tracing::debug;

use super::{may_have_committed, record_invalidation};
use crate::error::{ApiError, ApiResult};
use crate::types::{
    CreateTranslationRequest, ListTranslationsQuery, SearchTranslationsQuery,
    UpdateTranslationRequest,
};
use crate::validation::{
    split_csv, validate_key, validate_locale, validate_search_query, validate_tag_names,
    HasUpdates, MAX_LIST_PER_PAGE, MAX_SEARCH_PER_PAGE,
};

async fn after_commit(hook: &InvalidationHook) {
    let report = hook.translations_changed().await;
    debug!(
        generation = ?report.generation.map(|g| g.value()),
        tokens_cleared = report.tokens_cleared,
        failures = report.failures,
        "translation caches invalidated"
    );
    record_invalidation(EntityKind::Translation, &report);
}

/// Validate and insert a translation, then invalidate export caches.
pub async fn create_translation(
    store: &dyn TranslationStore,
    hook: &InvalidationHook,
    req: CreateTranslationRequest,
) -> ApiResult<TranslationWithTags> {
    let new = NewTranslation {
        key: validate_key(&req.key)?,
        locale: validate_locale(&req.locale)?,
        value: req.value,
        tags: validate_tag_names(&req.tags)?,
    };

    let result = store.translation_create(new).await;
    if result.as_ref().map_or_else(may_have_committed, |_| true) {
        after_commit(hook).await;
    }
    Ok(result?)
}

/// Apply a partial update, then invalidate export caches.
pub async fn update_translation(
    store: &dyn TranslationStore,
    hook: &InvalidationHook,
    id: TranslationId,
    req: UpdateTranslationRequest,
) -> ApiResult<TranslationWithTags> {
    if !req.has_any_updates() {
        return Err(ApiError::validation_failed("No fields to update"));
    }

    let mut patch = TranslationPatch::from(req);
    patch.key = patch.key.as_deref().map(validate_key).transpose()?;
    patch.locale = patch.locale.as_deref().map(validate_locale).transpose()?;
    patch.tags = patch
        .tags
        .as_deref()
        .map(validate_tag_names)
        .transpose()?;

    let result = store.translation_update(id, patch).await;
    if result
        .as_ref()
        .map_or_else(may_have_committed, |updated| updated.is_some())
    {
        after_commit(hook).await;
    }
    result?.ok_or_else(|| ApiError::translation_not_found(id))
}

/// Delete a translation, then invalidate export caches.
pub async fn delete_translation(
    store: &dyn TranslationStore,
    hook: &InvalidationHook,
    id: TranslationId,
) -> ApiResult<()> {
    let result = store.translation_delete(id).await;
    if result.as_ref().map_or_else(may_have_committed, |deleted| *deleted) {
        after_commit(hook).await;
    }
    if !result? {
        return Err(ApiError::translation_not_found(id));
    }
    Ok(())
}

/// Build the store filter and page for `GET /translations`.
pub fn list_filter(query: &ListTranslationsQuery) -> ApiResult<(TranslationFilter, PageRequest)> {
    let locale = query.locale.as_deref().map(validate_locale).transpose()?;
    let key_prefix = query
        .key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string);
    let q = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string);

    let filter = TranslationFilter {
        locale,
        key_prefix,
        query: q,
        tags: validate_tag_names(&split_csv(query.tag.as_deref()))?,
    };
    Ok((
        filter,
        PageRequest::new(query.page, query.per_page, MAX_LIST_PER_PAGE),
    ))
}

/// Build the store filter and page for `GET /translations/search`.
pub fn search_filter(
    query: &SearchTranslationsQuery,
) -> ApiResult<(TranslationFilter, PageRequest)> {
    let filter = TranslationFilter {
        locale: query.locale.as_deref().map(validate_locale).transpose()?,
        key_prefix: None,
        query: Some(validate_search_query(query.q.as_deref())?),
        tags: validate_tag_names(&split_csv(query.tag.as_deref()))?,
    };
    Ok((
        filter,
        PageRequest::new(query.page, query.per_page, MAX_SEARCH_PER_PAGE),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use polyglot_core::EntityIdType;
    use polyglot_storage::{
        CacheConfig, FreshnessCache, InMemoryCacheBackend, InMemoryStore, SharedStore,
    };
    use polyglot_core::ExportShape;
    use polyglot_test_utils::LostReplyStore;
    use std::sync::Arc;

    fn setup() -> (SharedStore, Arc<FreshnessCache>, InvalidationHook) {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let cache = Arc::new(FreshnessCache::new(
            Arc::new(InMemoryCacheBackend::new()),
            CacheConfig::default(),
        ));
        let hook = InvalidationHook::new(store.clone(), cache.clone());
        (store, cache, hook)
    }

    fn create_req(key: &str, locale: &str) -> CreateTranslationRequest {
        CreateTranslationRequest {
            key: key.to_string(),
            locale: locale.to_string(),
            value: "Hello".to_string(),
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_invalidates_locale_token() -> ApiResult<()> {
        let (store, cache, hook) = setup();
        create_translation(store.as_ref(), &hook, create_req("a", "en")).await?;

        let shape = ExportShape::locale("en");
        let before = cache.ensure_token(&shape).await;
        assert!(before.is_some());

        create_translation(store.as_ref(), &hook, create_req("b", "en")).await?;
        assert_ne!(cache.get_token(&shape).await, before);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_write_does_not_invalidate() -> ApiResult<()> {
        let (store, cache, hook) = setup();
        create_translation(store.as_ref(), &hook, create_req("a", "en")).await?;
        let token = cache.ensure_token(&ExportShape::All).await;

        let err = create_translation(store.as_ref(), &hook, create_req("a", "en"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityAlreadyExists);
        assert_eq!(cache.get_token(&ExportShape::All).await, token);
        Ok(())
    }

    #[tokio::test]
    async fn test_committed_write_with_lost_reply_still_invalidates() -> ApiResult<()> {
        let (store, cache, hook) = setup();
        let created = create_translation(store.as_ref(), &hook, create_req("a", "en")).await?;
        let id = created.translation.id;
        let lossy = LostReplyStore::new(store.clone());
        let shape = ExportShape::locale("en");

        let before = cache.ensure_token(&shape).await;
        assert!(before.is_some());
        let req = UpdateTranslationRequest {
            value: Some("Changed".to_string()),
            ..Default::default()
        };
        assert!(update_translation(&lossy, &hook, id, req).await.is_err());
        let stored = store.translation_get(id).await?;
        assert_eq!(stored.map(|t| t.translation.value).as_deref(), Some("Changed"));
        assert!(cache.get_token(&shape).await.is_none());

        cache.ensure_token(&shape).await;
        assert!(create_translation(&lossy, &hook, create_req("b", "en")).await.is_err());
        assert!(cache.get_token(&shape).await.is_none());

        cache.ensure_token(&shape).await;
        assert!(delete_translation(&lossy, &hook, id).await.is_err());
        assert!(store.translation_get(id).await?.is_none());
        assert!(cache.get_token(&shape).await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_requires_fields() {
        let (store, _, hook) = setup();
        let err = update_translation(
            store.as_ref(),
            &hook,
            TranslationId::new(1),
            UpdateTranslationRequest::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (store, _, hook) = setup();
        let req = UpdateTranslationRequest {
            value: Some("x".to_string()),
            ..Default::default()
        };
        let err = update_translation(store.as_ref(), &hook, TranslationId::new(99), req)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TranslationNotFound);
    }

    #[tokio::test]
    async fn test_invalid_locale_rejected_before_store() {
        let (store, _, hook) = setup();
        let err = create_translation(store.as_ref(), &hook, create_req("a", "english!"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[test]
    fn test_search_filter_requires_query() {
        let err = search_filter(&SearchTranslationsQuery::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingField);

        let (filter, page) = search_filter(&SearchTranslationsQuery {
            q: Some("hello".to_string()),
            per_page: Some(500),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(filter.query.as_deref(), Some("hello"));
        assert_eq!(page.per_page(), MAX_SEARCH_PER_PAGE);
    }

    #[test]
    fn test_list_filter_splits_tags() {
        let (filter, page) = list_filter(&ListTranslationsQuery {
            tag: Some("web, mobile".to_string()),
            key: Some("home.".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(filter.tags, vec!["mobile", "web"]);
        assert_eq!(filter.key_prefix.as_deref(), Some("home."));
        assert_eq!(page.per_page(), 15);
    }
}
