//! In-memory record store.
//!
//! Holds every table behind one `RwLock`, so each write (row plus association
//! rows) is applied atomically and readers never observe a half-applied write.
//! Ordering matches the Postgres store's byte-wise `COLLATE "C"` ordering.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

use ::async_trait::async_trait;
use chrono::Utc;
use polyglot_core::{
    normalize_tag_names, EntityIdType, ExportCursor, ExportRow, ExportScan, NewTranslation,
    NewUser, Page, PageRequest, PolyglotResult, StorageError, Tag, TagFilter, TagId, Translation,
    TranslationFilter, TranslationId, TranslationPatch, TranslationWithTags, UserCredentials,
    UserId,
};
use tokio::sync::RwLock;

use crate::store::{TranslationStore, UserStore};

#[derive(Debug, Default)]
struct MemoryState {
    next_translation_id: i64,
    next_tag_id: i64,
    next_user_id: i64,
    translations: BTreeMap<TranslationId, Translation>,
    by_locale_key: BTreeMap<(String, String), TranslationId>,
    tags: BTreeMap<TagId, Tag>,
    tag_names: HashMap<String, TagId>,
    links: BTreeSet<(TranslationId, TagId)>,
    users: HashMap<String, UserCredentials>,
}

impl MemoryState {
    fn link_range(id: TranslationId) -> std::ops::RangeInclusive<(TranslationId, TagId)> {
        (id, TagId::new(i64::MIN))..=(id, TagId::new(i64::MAX))
    }

    fn resolve_tags(&self, names: &[String]) -> PolyglotResult<Vec<TagId>> {
        let names = normalize_tag_names(names);
        let mut unknown = Vec::new();
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            match self.tag_names.get(&name) {
                Some(id) => ids.push(*id),
                None => unknown.push(name),
            }
        }
        if !unknown.is_empty() {
            return Err(StorageError::UnknownTags { names: unknown }.into());
        }
        Ok(ids)
    }

    fn replace_links(&mut self, id: TranslationId, tag_ids: &[TagId]) {
        let existing: Vec<_> = self.links.range(Self::link_range(id)).copied().collect();
        for link in existing {
            self.links.remove(&link);
        }
        for tag_id in tag_ids {
            self.links.insert((id, *tag_id));
        }
    }

    fn tags_of(&self, id: TranslationId) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self
            .links
            .range(Self::link_range(id))
            .filter_map(|(_, tag_id)| self.tags.get(tag_id).cloned())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    }

    fn has_any_tag(&self, id: TranslationId, names: &[String]) -> bool {
        self.links.range(Self::link_range(id)).any(|(_, tag_id)| {
            self.tags
                .get(tag_id)
                .is_some_and(|tag| names.iter().any(|n| *n == tag.name))
        })
    }

    fn with_tags(&self, translation: &Translation) -> TranslationWithTags {
        TranslationWithTags {
            translation: translation.clone(),
            tags: self.tags_of(translation.id),
        }
    }

    fn matches_filter(&self, translation: &Translation, filter: &TranslationFilter) -> bool {
        if let Some(locale) = &filter.locale {
            if translation.locale != *locale {
                return false;
            }
        }
        if let Some(prefix) = &filter.key_prefix {
            if !translation.key.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(query) = &filter.query {
            let needle = query.to_lowercase();
            if !translation.key.to_lowercase().contains(&needle)
                && !translation.value.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if !filter.tags.is_empty() && !self.has_any_tag(translation.id, &filter.tags) {
            return false;
        }
        true
    }
}

/// In-memory implementation of [`TranslationStore`] and [`UserStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn translation_count(&self) -> usize {
        self.state.read().await.translations.len()
    }

    pub async fn tag_count(&self) -> usize {
        self.state.read().await.tags.len()
    }

    /// Number of translation/tag association rows.
    pub async fn link_count(&self) -> usize {
        self.state.read().await.links.len()
    }
}

#[async_trait]
impl TranslationStore for InMemoryStore {
    async fn translation_create(&self, new: NewTranslation) -> PolyglotResult<TranslationWithTags> {
        let mut state = self.state.write().await;
        let index_key = (new.locale.clone(), new.key.clone());
        if state.by_locale_key.contains_key(&index_key) {
            return Err(StorageError::Conflict {
                entity: TranslationId::ENTITY_NAME,
                reason: format!("key '{}' already exists for locale '{}'", new.key, new.locale),
            }
            .into());
        }
        let tag_ids = state.resolve_tags(&new.tags)?;

        state.next_translation_id += 1;
        let id = TranslationId::new(state.next_translation_id);
        let now = Utc::now();
        let translation = Translation {
            id,
            key: new.key,
            locale: new.locale,
            value: new.value,
            created_at: now,
            updated_at: now,
        };
        state.by_locale_key.insert(index_key, id);
        state.translations.insert(id, translation.clone());
        state.replace_links(id, &tag_ids);
        Ok(state.with_tags(&translation))
    }

    async fn translation_get(
        &self,
        id: TranslationId,
    ) -> PolyglotResult<Option<TranslationWithTags>> {
        let state = self.state.read().await;
        Ok(state.translations.get(&id).map(|t| state.with_tags(t)))
    }

    async fn translation_update(
        &self,
        id: TranslationId,
        patch: TranslationPatch,
    ) -> PolyglotResult<Option<TranslationWithTags>> {
        let mut state = self.state.write().await;
        let Some(current) = state.translations.get(&id).cloned() else {
            return Ok(None);
        };

        let key = patch.key.unwrap_or_else(|| current.key.clone());
        let locale = patch.locale.unwrap_or_else(|| current.locale.clone());
        let new_index = (locale.clone(), key.clone());
        if let Some(other) = state.by_locale_key.get(&new_index) {
            if *other != id {
                return Err(StorageError::Conflict {
                    entity: TranslationId::ENTITY_NAME,
                    reason: format!("key '{}' already exists for locale '{}'", key, locale),
                }
                .into());
            }
        }
        let tag_ids = match &patch.tags {
            Some(names) => Some(state.resolve_tags(names)?),
            None => None,
        };

        let updated = Translation {
            id,
            key,
            locale,
            value: patch.value.unwrap_or_else(|| current.value.clone()),
            created_at: current.created_at,
            updated_at: Utc::now(),
        };
        state
            .by_locale_key
            .remove(&(current.locale.clone(), current.key.clone()));
        state.by_locale_key.insert(new_index, id);
        state.translations.insert(id, updated.clone());
        if let Some(tag_ids) = tag_ids {
            state.replace_links(id, &tag_ids);
        }
        Ok(Some(state.with_tags(&updated)))
    }

    async fn translation_delete(&self, id: TranslationId) -> PolyglotResult<bool> {
        let mut state = self.state.write().await;
        let Some(removed) = state.translations.remove(&id) else {
            return Ok(false);
        };
        state.by_locale_key.remove(&(removed.locale, removed.key));
        state.replace_links(id, &[]);
        Ok(true)
    }

    async fn translation_list(
        &self,
        filter: &TranslationFilter,
        page: PageRequest,
    ) -> PolyglotResult<Page<TranslationWithTags>> {
        let state = self.state.read().await;
        let matching: Vec<&Translation> = state
            .by_locale_key
            .values()
            .filter_map(|id| state.translations.get(id))
            .filter(|t| state.matches_filter(t, filter))
            .collect();
        let total = matching.len() as u64;
        let data = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|t| state.with_tags(t))
            .collect();
        Ok(Page::new(data, page, total))
    }

    async fn export_chunk(
        &self,
        scan: &ExportScan,
        after: Option<&ExportCursor>,
        limit: usize,
    ) -> PolyglotResult<Vec<ExportRow>> {
        let state = self.state.read().await;
        let lower = match after {
            Some(cursor) => Bound::Excluded((cursor.locale.clone(), cursor.key.clone())),
            None => match &scan.locale {
                Some(locale) => Bound::Included((locale.clone(), String::new())),
                None => Bound::Unbounded,
            },
        };

        let mut rows = Vec::with_capacity(limit.min(1024));
        for ((locale, _), id) in state.by_locale_key.range((lower, Bound::Unbounded)) {
            if rows.len() >= limit {
                break;
            }
            if let Some(wanted) = &scan.locale {
                if locale > wanted {
                    break;
                }
                if locale != wanted {
                    continue;
                }
            }
            if !scan.tags.is_empty() && !state.has_any_tag(*id, &scan.tags) {
                continue;
            }
            if let Some(t) = state.translations.get(id) {
                rows.push(ExportRow::new(&t.locale, &t.key, &t.value));
            }
        }
        Ok(rows)
    }

    async fn locales_distinct(&self) -> PolyglotResult<Vec<String>> {
        let state = self.state.read().await;
        let mut locales: Vec<String> = Vec::new();
        for (locale, _) in state.by_locale_key.keys() {
            if locales.last() != Some(locale) {
                locales.push(locale.clone());
            }
        }
        Ok(locales)
    }

    async fn tag_create(&self, name: &str) -> PolyglotResult<Tag> {
        let mut state = self.state.write().await;
        if state.tag_names.contains_key(name) {
            return Err(StorageError::Conflict {
                entity: TagId::ENTITY_NAME,
                reason: format!("tag '{}' already exists", name),
            }
            .into());
        }
        state.next_tag_id += 1;
        let now = Utc::now();
        let tag = Tag {
            id: TagId::new(state.next_tag_id),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.tag_names.insert(tag.name.clone(), tag.id);
        state.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    async fn tag_get(&self, id: TagId) -> PolyglotResult<Option<Tag>> {
        Ok(self.state.read().await.tags.get(&id).cloned())
    }

    async fn tag_update(&self, id: TagId, name: &str) -> PolyglotResult<Option<Tag>> {
        let mut state = self.state.write().await;
        let Some(current) = state.tags.get(&id).cloned() else {
            return Ok(None);
        };
        if let Some(other) = state.tag_names.get(name) {
            if *other != id {
                return Err(StorageError::Conflict {
                    entity: TagId::ENTITY_NAME,
                    reason: format!("tag '{}' already exists", name),
                }
                .into());
            }
        }
        let updated = Tag {
            name: name.to_string(),
            updated_at: Utc::now(),
            ..current.clone()
        };
        state.tag_names.remove(&current.name);
        state.tag_names.insert(updated.name.clone(), id);
        state.tags.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn tag_delete(&self, id: TagId) -> PolyglotResult<bool> {
        let mut state = self.state.write().await;
        let Some(removed) = state.tags.remove(&id) else {
            return Ok(false);
        };
        state.tag_names.remove(&removed.name);
        state.links.retain(|(_, tag_id)| *tag_id != id);
        Ok(true)
    }

    async fn tag_list(&self, filter: &TagFilter, page: PageRequest) -> PolyglotResult<Page<Tag>> {
        let state = self.state.read().await;
        let needle = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut matching: Vec<&Tag> = state
            .tags
            .values()
            .filter(|t| {
                needle
                    .as_ref()
                    .map_or(true, |n| t.name.to_lowercase().contains(n.as_str()))
            })
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        let total = matching.len() as u64;
        let data = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();
        Ok(Page::new(data, page, total))
    }

    async fn tag_all(&self) -> PolyglotResult<Vec<Tag>> {
        let state = self.state.read().await;
        let mut tags: Vec<Tag> = state.tags.values().cloned().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn ping(&self) -> PolyglotResult<()> {
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn user_find_by_email(&self, email: &str) -> PolyglotResult<Option<UserCredentials>> {
        Ok(self.state.read().await.users.get(email).cloned())
    }

    async fn user_upsert(&self, user: NewUser) -> PolyglotResult<UserCredentials> {
        let mut state = self.state.write().await;
        let id = match state.users.get(&user.email) {
            Some(existing) => existing.id,
            None => {
                state.next_user_id += 1;
                UserId::new(state.next_user_id)
            }
        };
        let credentials = UserCredentials {
            id,
            email: user.email,
            name: user.name,
            password_salt: user.password_salt,
            password_hash: user.password_hash,
        };
        state
            .users
            .insert(credentials.email.clone(), credentials.clone());
        Ok(credentials)
    }
}
