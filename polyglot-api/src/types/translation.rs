//! Translation-related API types

use polyglot_core::{Page, Timestamp, TranslationId, TranslationPatch, TranslationWithTags};
use serde::{Deserialize, Serialize};

use crate::validation::HasUpdates;

/// Request to create a new translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateTranslationRequest {
    /// Dotted key, e.g. `home.title`
    pub key: String,
    /// Locale code, e.g. `en` or `pt_BR`
    pub locale: String,
    /// Translated text
    pub value: String,
    /// Names of existing tags to attach
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request to update a translation. Absent fields are left unchanged;
/// a present `tags` list replaces the whole tag set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateTranslationRequest {
    pub key: Option<String>,
    pub locale: Option<String>,
    pub value: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl HasUpdates for UpdateTranslationRequest {
    fn has_any_updates(&self) -> bool {
        self.key.is_some() || self.locale.is_some() || self.value.is_some() || self.tags.is_some()
    }
}

impl From<UpdateTranslationRequest> for TranslationPatch {
    fn from(req: UpdateTranslationRequest) -> Self {
        Self {
            key: req.key,
            locale: req.locale,
            value: req.value,
            tags: req.tags,
        }
    }
}

/// Query string of `GET /translations`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct ListTranslationsQuery {
    /// Exact locale
    pub locale: Option<String>,
    /// Key prefix
    pub key: Option<String>,
    /// Substring of key or value
    pub q: Option<String>,
    /// Comma separated tag names, any of which must match
    pub tag: Option<String>,
    pub page: Option<u32>,
    /// Page size, at most 100
    pub per_page: Option<u32>,
}

/// Query string of `GET /translations/search`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct SearchTranslationsQuery {
    /// Search term, at least 2 characters
    pub q: Option<String>,
    pub locale: Option<String>,
    /// Comma separated tag names, any of which must match
    pub tag: Option<String>,
    pub page: Option<u32>,
    /// Page size, at most 50
    pub per_page: Option<u32>,
}

/// Translation with its tag names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TranslationResponse {
    #[cfg_attr(feature = "openapi", schema(value_type = i64))]
    pub id: TranslationId,
    pub key: String,
    pub locale: String,
    pub value: String,
    /// Tag names, sorted
    pub tags: Vec<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub updated_at: Timestamp,
}

impl From<TranslationWithTags> for TranslationResponse {
    fn from(twt: TranslationWithTags) -> Self {
        let tags = twt.tags.into_iter().map(|t| t.name).collect();
        let t = twt.translation;
        Self {
            id: t.id,
            key: t.key,
            locale: t.locale,
            value: t.value,
            tags,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

/// One page of translations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TranslationPage {
    pub data: Vec<TranslationResponse>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
}

impl From<Page<TranslationWithTags>> for TranslationPage {
    fn from(page: Page<TranslationWithTags>) -> Self {
        let page = page.map(TranslationResponse::from);
        Self {
            data: page.data,
            page: page.page,
            per_page: page.per_page,
            total: page.total,
            last_page: page.last_page,
        }
    }
}
