//! Polyglot Test Utilities
//!
//! Shared test infrastructure for the Polyglot workspace:
//! - Proptest generators for translation data
//! - Mock stores and cache backends for failure and cancellation tests
//! - Fixtures for seeding an in-memory store

pub use polyglot_core::{
    EntityIdType, ExportCursor, ExportRow, ExportScan, ExportShape, NewTranslation, PolyglotError,
    PolyglotResult, StorageError, Tag, TagId, TranslationId,
};
pub use polyglot_storage::{
    CacheBackend, InMemoryCacheBackend, InMemoryStore, SharedStore, TranslationStore,
};

use async_trait::async_trait;
use polyglot_core::{
    CacheError, Page, PageRequest, TagFilter, TranslationFilter, TranslationPatch,
    TranslationWithTags,
};
use polyglot_storage::{CacheEntry, CacheStats, Retention};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// MOCK BACKENDS
// ============================================================================

/// Cache backend whose every operation fails, as if the server were down.
#[derive(Debug, Default, Clone)]
pub struct UnavailableCacheBackend;

fn cache_down() -> PolyglotError {
    CacheError::Unavailable {
        reason: "connection refused".to_string(),
    }
    .into()
}

#[async_trait]
impl CacheBackend for UnavailableCacheBackend {
    async fn get(&self, _key: &str) -> PolyglotResult<Option<CacheEntry>> {
        Err(cache_down())
    }

    async fn set(&self, _key: &str, _value: &str, _retention: Retention) -> PolyglotResult<()> {
        Err(cache_down())
    }

    async fn add(&self, _key: &str, _value: &str, _retention: Retention) -> PolyglotResult<String> {
        Err(cache_down())
    }

    async fn delete(&self, _key: &str) -> PolyglotResult<bool> {
        Err(cache_down())
    }

    async fn delete_prefix(&self, _prefix: &str) -> PolyglotResult<u64> {
        Err(cache_down())
    }

    async fn increment(&self, _key: &str) -> PolyglotResult<u64> {
        Err(cache_down())
    }

    async fn stats(&self) -> PolyglotResult<CacheStats> {
        Err(cache_down())
    }
}

/// Store wrapper that counts `export_chunk` and `tag_all` calls and delegates
/// everything.
pub struct CountingStore {
    inner: SharedStore,
    chunk_calls: AtomicUsize,
    tag_all_calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: SharedStore) -> Self {
        Self {
            inner,
            chunk_calls: AtomicUsize::new(0),
            tag_all_calls: AtomicUsize::new(0),
        }
    }

    pub fn chunk_calls(&self) -> usize {
        self.chunk_calls.load(Ordering::SeqCst)
    }

    pub fn tag_all_calls(&self) -> usize {
        self.tag_all_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationStore for CountingStore {
    async fn translation_create(&self, new: NewTranslation) -> PolyglotResult<TranslationWithTags> {
        self.inner.translation_create(new).await
    }

    async fn translation_get(
        &self,
        id: TranslationId,
    ) -> PolyglotResult<Option<TranslationWithTags>> {
        self.inner.translation_get(id).await
    }

    async fn translation_update(
        &self,
        id: TranslationId,
        patch: TranslationPatch,
    ) -> PolyglotResult<Option<TranslationWithTags>> {
        self.inner.translation_update(id, patch).await
    }

    async fn translation_delete(&self, id: TranslationId) -> PolyglotResult<bool> {
        self.inner.translation_delete(id).await
    }

    async fn translation_list(
        &self,
        filter: &TranslationFilter,
        page: PageRequest,
    ) -> PolyglotResult<Page<TranslationWithTags>> {
        self.inner.translation_list(filter, page).await
    }

    async fn export_chunk(
        &self,
        scan: &ExportScan,
        after: Option<&ExportCursor>,
        limit: usize,
    ) -> PolyglotResult<Vec<ExportRow>> {
        self.chunk_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.export_chunk(scan, after, limit).await
    }

    async fn locales_distinct(&self) -> PolyglotResult<Vec<String>> {
        self.inner.locales_distinct().await
    }

    async fn tag_create(&self, name: &str) -> PolyglotResult<Tag> {
        self.inner.tag_create(name).await
    }

    async fn tag_get(&self, id: TagId) -> PolyglotResult<Option<Tag>> {
        self.inner.tag_get(id).await
    }

    async fn tag_update(&self, id: TagId, name: &str) -> PolyglotResult<Option<Tag>> {
        self.inner.tag_update(id, name).await
    }

    async fn tag_delete(&self, id: TagId) -> PolyglotResult<bool> {
        self.inner.tag_delete(id).await
    }

    async fn tag_list(&self, filter: &TagFilter, page: PageRequest) -> PolyglotResult<Page<Tag>> {
        self.inner.tag_list(filter, page).await
    }

    async fn tag_all(&self) -> PolyglotResult<Vec<Tag>> {
        self.tag_all_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.tag_all().await
    }

    async fn ping(&self) -> PolyglotResult<()> {
        self.inner.ping().await
    }
}

/// Store that applies every write to `inner`, then reports the connection as
/// lost, as if the commit landed but the reply did not. Reads delegate.
pub struct LostReplyStore {
    inner: SharedStore,
}

impl LostReplyStore {
    pub fn new(inner: SharedStore) -> Self {
        Self { inner }
    }
}

fn reply_lost() -> PolyglotError {
    StorageError::Unavailable {
        reason: "connection closed after commit".to_string(),
    }
    .into()
}

#[async_trait]
impl TranslationStore for LostReplyStore {
    async fn translation_create(&self, new: NewTranslation) -> PolyglotResult<TranslationWithTags> {
        self.inner.translation_create(new).await?;
        Err(reply_lost())
    }

    async fn translation_get(
        &self,
        id: TranslationId,
    ) -> PolyglotResult<Option<TranslationWithTags>> {
        self.inner.translation_get(id).await
    }

    async fn translation_update(
        &self,
        id: TranslationId,
        patch: TranslationPatch,
    ) -> PolyglotResult<Option<TranslationWithTags>> {
        self.inner.translation_update(id, patch).await?;
        Err(reply_lost())
    }

    async fn translation_delete(&self, id: TranslationId) -> PolyglotResult<bool> {
        self.inner.translation_delete(id).await?;
        Err(reply_lost())
    }

    async fn translation_list(
        &self,
        filter: &TranslationFilter,
        page: PageRequest,
    ) -> PolyglotResult<Page<TranslationWithTags>> {
        self.inner.translation_list(filter, page).await
    }

    async fn export_chunk(
        &self,
        scan: &ExportScan,
        after: Option<&ExportCursor>,
        limit: usize,
    ) -> PolyglotResult<Vec<ExportRow>> {
        self.inner.export_chunk(scan, after, limit).await
    }

    async fn locales_distinct(&self) -> PolyglotResult<Vec<String>> {
        self.inner.locales_distinct().await
    }

    async fn tag_create(&self, name: &str) -> PolyglotResult<Tag> {
        self.inner.tag_create(name).await?;
        Err(reply_lost())
    }

    async fn tag_get(&self, id: TagId) -> PolyglotResult<Option<Tag>> {
        self.inner.tag_get(id).await
    }

    async fn tag_update(&self, id: TagId, name: &str) -> PolyglotResult<Option<Tag>> {
        self.inner.tag_update(id, name).await?;
        Err(reply_lost())
    }

    async fn tag_delete(&self, id: TagId) -> PolyglotResult<bool> {
        self.inner.tag_delete(id).await?;
        Err(reply_lost())
    }

    async fn tag_list(&self, filter: &TagFilter, page: PageRequest) -> PolyglotResult<Page<Tag>> {
        self.inner.tag_list(filter, page).await
    }

    async fn tag_all(&self) -> PolyglotResult<Vec<Tag>> {
        self.inner.tag_all().await
    }

    async fn ping(&self) -> PolyglotResult<()> {
        self.inner.ping().await
    }
}

/// Store that serves a fixed script of export chunks, in order, regardless of
/// cursor. Everything else reports the store as unavailable.
pub struct ScriptedExportStore {
    chunks: Mutex<VecDeque<PolyglotResult<Vec<ExportRow>>>>,
}

impl ScriptedExportStore {
    pub fn new(chunks: Vec<PolyglotResult<Vec<ExportRow>>>) -> Self {
        Self {
            chunks: Mutex::new(chunks.into()),
        }
    }
}

fn store_down() -> PolyglotError {
    StorageError::Unavailable {
        reason: "scripted store".to_string(),
    }
    .into()
}

#[async_trait]
impl TranslationStore for ScriptedExportStore {
    async fn translation_create(&self, _new: NewTranslation) -> PolyglotResult<TranslationWithTags> {
        Err(store_down())
    }

    async fn translation_get(
        &self,
        _id: TranslationId,
    ) -> PolyglotResult<Option<TranslationWithTags>> {
        Err(store_down())
    }

    async fn translation_update(
        &self,
        _id: TranslationId,
        _patch: TranslationPatch,
    ) -> PolyglotResult<Option<TranslationWithTags>> {
        Err(store_down())
    }

    async fn translation_delete(&self, _id: TranslationId) -> PolyglotResult<bool> {
        Err(store_down())
    }

    async fn translation_list(
        &self,
        _filter: &TranslationFilter,
        _page: PageRequest,
    ) -> PolyglotResult<Page<TranslationWithTags>> {
        Err(store_down())
    }

    async fn export_chunk(
        &self,
        _scan: &ExportScan,
        _after: Option<&ExportCursor>,
        _limit: usize,
    ) -> PolyglotResult<Vec<ExportRow>> {
        let mut chunks = self.chunks.lock().map_err(|_| store_down())?;
        chunks.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn locales_distinct(&self) -> PolyglotResult<Vec<String>> {
        Err(store_down())
    }

    async fn tag_create(&self, _name: &str) -> PolyglotResult<Tag> {
        Err(store_down())
    }

    async fn tag_get(&self, _id: TagId) -> PolyglotResult<Option<Tag>> {
        Err(store_down())
    }

    async fn tag_update(&self, _id: TagId, _name: &str) -> PolyglotResult<Option<Tag>> {
        Err(store_down())
    }

    async fn tag_delete(&self, _id: TagId) -> PolyglotResult<bool> {
        Err(store_down())
    }

    async fn tag_list(&self, _filter: &TagFilter, _page: PageRequest) -> PolyglotResult<Page<Tag>> {
        Err(store_down())
    }

    async fn tag_all(&self) -> PolyglotResult<Vec<Tag>> {
        Err(store_down())
    }

    async fn ping(&self) -> PolyglotResult<()> {
        Err(store_down())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for translation data.

    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    /// Generate a locale code such as `en`, `fr`, or `pt_BR`.
    pub fn arb_locale() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("en".to_string()),
            Just("fr".to_string()),
            Just("de".to_string()),
            Just("es".to_string()),
            Just("pt_BR".to_string()),
            "[a-z]{2}",
        ]
    }

    /// Generate a dotted translation key.
    pub fn arb_key() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,8}(\\.[a-z][a-z0-9_]{0,8}){0,2}"
    }

    /// Generate a value that exercises JSON escaping: quotes, backslashes,
    /// slashes, control characters, and non-ASCII text.
    pub fn arb_value() -> impl Strategy<Value = String> {
        prop_oneof![
            "\\PC{0,40}",
            prop::collection::vec(
                prop_oneof![
                    Just("\"".to_string()),
                    Just("\\".to_string()),
                    Just("/".to_string()),
                    Just("\n".to_string()),
                    Just("\u{0007}".to_string()),
                    Just("日本語".to_string()),
                    Just("émoji 🎉".to_string()),
                    "[a-z ]{1,5}",
                ],
                0..8
            )
            .prop_map(|parts| parts.concat()),
        ]
    }

    /// Generate a valid tag name.
    pub fn arb_tag_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,15}"
    }

    /// Generate a set of translations with unique `(locale, key)` pairs.
    pub fn arb_translation_set(
        max: usize,
    ) -> impl Strategy<Value = BTreeMap<(String, String), String>> {
        prop::collection::btree_map((arb_locale(), arb_key()), arb_value(), 0..max)
    }

    /// Generate a valid export chunk size.
    pub fn arb_chunk_size() -> impl Strategy<Value = usize> {
        1usize..16
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built data for common scenarios.

    use super::*;

    /// `(locale, key, value, tags)`
    pub type RowSpec<'a> = (&'a str, &'a str, &'a str, &'a [&'a str]);

    /// The three-row example used throughout: two English keys, one French.
    pub fn grouping_rows() -> Vec<RowSpec<'static>> {
        vec![
            ("en", "a", "1", &["web"][..]),
            ("en", "b", "2", &["mobile"][..]),
            ("fr", "a", "3", &["web", "mobile"][..]),
        ]
    }

    /// Build an in-memory store holding `rows`, creating tags as needed.
    pub async fn store_with_rows(rows: &[RowSpec<'_>]) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        seed(store.as_ref(), rows).await;
        store
    }

    /// Insert `rows` into any store, creating missing tags first.
    pub async fn seed(store: &dyn TranslationStore, rows: &[RowSpec<'_>]) {
        let mut existing: Vec<String> = store
            .tag_all()
            .await
            .map(|tags| tags.into_iter().map(|t| t.name).collect())
            .unwrap_or_default();
        for (_, _, _, tags) in rows {
            for tag in tags.iter() {
                if !existing.iter().any(|t| t == tag) && store.tag_create(tag).await.is_ok() {
                    existing.push(tag.to_string());
                }
            }
        }
        for (locale, key, value, tags) in rows {
            let _ = store
                .translation_create(NewTranslation {
                    key: key.to_string(),
                    locale: locale.to_string(),
                    value: value.to_string(),
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                })
                .await;
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Helpers for checking export bodies.

    use serde_json::Value;

    /// Parse a complete export body, panicking with the body on failure.
    pub fn parse_export(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap_or_else(|e| {
            panic!(
                "export body is not valid JSON ({}): {}",
                e,
                String::from_utf8_lossy(body)
            )
        })
    }
}
