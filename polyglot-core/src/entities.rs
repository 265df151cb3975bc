//! Translation, tag, and user records.

use crate::identity::{TagId, Timestamp, TranslationId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maximum length of a tag name after trimming.
pub const TAG_NAME_MAX_LEN: usize = 50;

/// Maximum length of a translation key.
pub const TRANSLATION_KEY_MAX_LEN: usize = 255;

/// Maximum length of a locale code.
pub const LOCALE_MAX_LEN: usize = 16;

/// A single key/locale/value translation string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Translation {
    pub id: TranslationId,
    pub key: String,
    pub locale: String,
    pub value: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub updated_at: Timestamp,
}

/// A named label grouping translations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub updated_at: Timestamp,
}

/// A translation together with its tags, sorted by tag name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TranslationWithTags {
    #[serde(flatten)]
    pub translation: Translation,
    pub tags: Vec<Tag>,
}

impl TranslationWithTags {
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Input for creating a translation. Tags are referenced by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTranslation {
    pub key: String,
    pub locale: String,
    pub value: String,
    pub tags: Vec<String>,
}

/// Partial update of a translation. `tags: Some(..)` replaces the whole set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationPatch {
    pub key: Option<String>,
    pub locale: Option<String>,
    pub value: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl TranslationPatch {
    pub fn is_empty(&self) -> bool {
        self.key.is_none() && self.locale.is_none() && self.value.is_none() && self.tags.is_none()
    }
}

/// Stored credentials for a user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredentials {
    pub id: UserId,
    pub email: String,
    pub name: String,
    /// Hex encoded salt.
    pub password_salt: String,
    /// Hex encoded PBKDF2-HMAC-SHA256 key derived from the password and salt.
    pub password_hash: String,
}

/// Input for creating or replacing a user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_salt: String,
    pub password_hash: String,
}

/// Trim a tag name. Returns `None` for blank names.
pub fn normalize_tag_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Trim, drop blanks, dedupe, and sort a list of tag names.
pub fn normalize_tag_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|n| normalize_tag_name(n.as_ref()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tag_names_trims_dedupes_and_sorts() {
        let names = normalize_tag_names(["web ", " mobile", "web", "  ", "desktop"]);
        assert_eq!(names, vec!["desktop", "mobile", "web"]);
    }

    #[test]
    fn test_normalize_tag_name_rejects_blank() {
        assert_eq!(normalize_tag_name("   "), None);
        assert_eq!(normalize_tag_name(" web "), Some("web".to_string()));
    }

    #[test]
    fn test_translation_patch_is_empty() {
        assert!(TranslationPatch::default().is_empty());
        let patch = TranslationPatch {
            tags: Some(vec![]),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_translation_with_tags_flattens_on_serialize() {
        let now = chrono::Utc::now();
        let twt = TranslationWithTags {
            translation: Translation {
                id: TranslationId::from(1),
                key: "home.title".to_string(),
                locale: "en".to_string(),
                value: "Home".to_string(),
                created_at: now,
                updated_at: now,
            },
            tags: vec![],
        };
        let json = serde_json::to_value(&twt).unwrap();
        assert_eq!(json["key"], "home.title");
        assert_eq!(json["id"], 1);
        assert!(json["tags"].as_array().unwrap().is_empty());
    }
}
