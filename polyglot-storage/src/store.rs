//! Async record store traits.
//!
//! The store owns translations, tags, and their association rows. Every write
//! is atomic: association changes commit together with the row they belong to.
//! Exports read through [`TranslationStore::export_chunk`], a keyset scan that
//! each call performs as an independent short read.

use ::async_trait::async_trait;
use polyglot_core::{
    ExportCursor, ExportRow, ExportScan, NewTranslation, NewUser, Page, PageRequest,
    PolyglotResult, Tag, TagFilter, TagId, TranslationFilter, TranslationId, TranslationPatch,
    TranslationWithTags, UserCredentials,
};
use std::sync::Arc;

/// Shared handle to a record store.
pub type SharedStore = Arc<dyn TranslationStore>;

/// Shared handle to a user store.
pub type SharedUserStore = Arc<dyn UserStore>;

/// Record store for translations and tags.
#[async_trait]
pub trait TranslationStore: Send + Sync {
    // ========================================================================
    // TRANSLATION OPERATIONS
    // ========================================================================

    /// Insert a translation and attach the named tags.
    ///
    /// Fails with `StorageError::Conflict` when `(key, locale)` already exists
    /// and with `StorageError::UnknownTags` when a tag name does not exist.
    async fn translation_create(&self, new: NewTranslation) -> PolyglotResult<TranslationWithTags>;

    /// Get a translation by id.
    async fn translation_get(&self, id: TranslationId)
        -> PolyglotResult<Option<TranslationWithTags>>;

    /// Apply a partial update. `patch.tags` replaces the full tag set.
    async fn translation_update(
        &self,
        id: TranslationId,
        patch: TranslationPatch,
    ) -> PolyglotResult<Option<TranslationWithTags>>;

    /// Delete a translation and its association rows.
    async fn translation_delete(&self, id: TranslationId) -> PolyglotResult<bool>;

    /// Filtered, paginated listing ordered by `(locale, key)`.
    async fn translation_list(
        &self,
        filter: &TranslationFilter,
        page: PageRequest,
    ) -> PolyglotResult<Page<TranslationWithTags>>;

    /// Read up to `limit` rows strictly after `after`, ordered by `(locale, key)`.
    async fn export_chunk(
        &self,
        scan: &ExportScan,
        after: Option<&ExportCursor>,
        limit: usize,
    ) -> PolyglotResult<Vec<ExportRow>>;

    /// Distinct locales present, ascending.
    async fn locales_distinct(&self) -> PolyglotResult<Vec<String>>;

    // ========================================================================
    // TAG OPERATIONS
    // ========================================================================

    /// Create a tag. Fails with `StorageError::Conflict` on a duplicate name.
    async fn tag_create(&self, name: &str) -> PolyglotResult<Tag>;

    async fn tag_get(&self, id: TagId) -> PolyglotResult<Option<Tag>>;

    /// Rename a tag. Fails with `StorageError::Conflict` on a duplicate name.
    async fn tag_update(&self, id: TagId, name: &str) -> PolyglotResult<Option<Tag>>;

    /// Delete a tag and its association rows.
    async fn tag_delete(&self, id: TagId) -> PolyglotResult<bool>;

    /// Filtered, paginated tag listing ordered by name.
    async fn tag_list(&self, filter: &TagFilter, page: PageRequest) -> PolyglotResult<Page<Tag>>;

    /// Every tag, ordered by name.
    async fn tag_all(&self) -> PolyglotResult<Vec<Tag>>;

    /// Cheap round trip used by the readiness check.
    async fn ping(&self) -> PolyglotResult<()>;
}

/// Credential lookups for login.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user_find_by_email(&self, email: &str) -> PolyglotResult<Option<UserCredentials>>;

    /// Insert a user, or replace name and credentials when the email exists.
    async fn user_upsert(&self, user: NewUser) -> PolyglotResult<UserCredentials>;
}
