//! Request Validation
//!
//! Field rules shared by the translation and tag handlers. Validators return
//! the normalized value so handlers never store untrimmed input.

use once_cell::sync::Lazy;
use polyglot_core::{
    normalize_tag_name, normalize_tag_names, ValidationError, LOCALE_MAX_LEN, TAG_NAME_MAX_LEN,
    TRANSLATION_KEY_MAX_LEN,
};
use regex::Regex;

/// Shortest accepted search term.
pub const MIN_SEARCH_LEN: usize = 2;

/// Largest page size for listings.
pub const MAX_LIST_PER_PAGE: u32 = 100;

/// Largest page size for search.
pub const MAX_SEARCH_PER_PAGE: u32 = 50;

static LOCALE_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{2,3}([_-][A-Za-z0-9]{2,8})*$").ok());

static KEY_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-:/]*$").ok());

fn matches(re: &Lazy<Option<Regex>>, value: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(value))
}

/// Trait for validating non-empty strings.
///
/// # Example
/// ```ignore
/// use polyglot_api::validation::ValidateNonEmpty;
///
/// req.key.validate_non_empty("key")?;
/// ```
pub trait ValidateNonEmpty {
    /// Fails with `RequiredFieldMissing` when the value is empty or whitespace.
    fn validate_non_empty(&self, field_name: &str) -> Result<(), ValidationError>;
}

impl ValidateNonEmpty for str {
    fn validate_non_empty(&self, field_name: &str) -> Result<(), ValidationError> {
        if self.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: field_name.to_string(),
            });
        }
        Ok(())
    }
}

impl ValidateNonEmpty for String {
    fn validate_non_empty(&self, field_name: &str) -> Result<(), ValidationError> {
        self.as_str().validate_non_empty(field_name)
    }
}

impl<T: ValidateNonEmpty> ValidateNonEmpty for Option<T> {
    fn validate_non_empty(&self, field_name: &str) -> Result<(), ValidationError> {
        match self {
            Some(value) => value.validate_non_empty(field_name),
            None => Err(ValidationError::RequiredFieldMissing {
                field: field_name.to_string(),
            }),
        }
    }
}

/// Trait for checking if an update request has any fields set.
pub trait HasUpdates {
    fn has_any_updates(&self) -> bool;
}

fn too_long(field: &str, len: usize, max: usize) -> ValidationError {
    ValidationError::TooLong {
        field: field.to_string(),
        len,
        max,
    }
}

fn invalid(field: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Validate a locale code such as `en`, `pt_BR`, or `zh-Hant`.
pub fn validate_locale(locale: &str) -> Result<String, ValidationError> {
    locale.validate_non_empty("locale")?;
    let locale = locale.trim();
    let len = locale.chars().count();
    if len > LOCALE_MAX_LEN {
        return Err(too_long("locale", len, LOCALE_MAX_LEN));
    }
    if !matches(&LOCALE_RE, locale) {
        return Err(invalid("locale", "must look like 'en', 'pt_BR' or 'zh-Hant'"));
    }
    Ok(locale.to_string())
}

/// Validate a dotted translation key.
pub fn validate_key(key: &str) -> Result<String, ValidationError> {
    key.validate_non_empty("key")?;
    let key = key.trim();
    let len = key.chars().count();
    if len > TRANSLATION_KEY_MAX_LEN {
        return Err(too_long("key", len, TRANSLATION_KEY_MAX_LEN));
    }
    if !matches(&KEY_RE, key) {
        return Err(invalid(
            "key",
            "may only contain letters, digits, '.', '_', '-', ':' and '/'",
        ));
    }
    Ok(key.to_string())
}

/// Validate and trim a tag name.
pub fn validate_tag_name(name: &str) -> Result<String, ValidationError> {
    let name = normalize_tag_name(name).ok_or_else(|| ValidationError::RequiredFieldMissing {
        field: "name".to_string(),
    })?;
    let len = name.chars().count();
    if len > TAG_NAME_MAX_LEN {
        return Err(too_long("name", len, TAG_NAME_MAX_LEN));
    }
    Ok(name)
}

/// Validate the tag names attached to a translation. Blank entries are
/// dropped and duplicates collapse.
pub fn validate_tag_names(names: &[String]) -> Result<Vec<String>, ValidationError> {
    let names = normalize_tag_names(names);
    if let Some(long) = names.iter().find(|n| n.chars().count() > TAG_NAME_MAX_LEN) {
        return Err(too_long("tags", long.chars().count(), TAG_NAME_MAX_LEN));
    }
    Ok(names)
}

/// Validate a search term.
pub fn validate_search_query(query: Option<&str>) -> Result<String, ValidationError> {
    let query = query.map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "q".to_string(),
        });
    }
    if query.chars().count() < MIN_SEARCH_LEN {
        return Err(invalid("q", "must be at least 2 characters"));
    }
    Ok(query.to_string())
}

/// Split a comma separated query value into trimmed, non-empty parts.
pub fn split_csv(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
