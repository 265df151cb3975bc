//! Export shapes and the ordered scan they map onto.

use crate::entities::normalize_tag_names;
use crate::identity::compute_content_hash;
use serde::{Deserialize, Serialize};

/// Entity families whose writes invalidate cached exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Translation,
    Tag,
}

/// A distinct cacheable export view.
///
/// Every shape has its own freshness token. Tag sets are normalized on
/// construction so `a,b` and `b, a` address the same token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExportShape {
    /// Every locale, grouped as `{locale: {key: value}}`.
    All,
    /// One locale, flat `{key: value}`.
    Locale(String),
    /// Rows carrying at least one of `tags`, grouped, optionally one locale.
    Tags {
        tags: Vec<String>,
        locale: Option<String>,
    },
    /// The list of locales present.
    Locales,
}

impl ExportShape {
    pub fn locale(locale: impl Into<String>) -> Self {
        Self::Locale(locale.into())
    }

    /// Build a tag-filtered shape. Returns `None` when no usable tag name remains.
    pub fn tags<I, S>(names: I, locale: Option<String>) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = normalize_tag_names(names);
        if tags.is_empty() {
            return None;
        }
        Some(Self::Tags { tags, locale })
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Locale(_) => "locale",
            Self::Tags { .. } => "tags",
            Self::Locales => "locales",
        }
    }

    /// Stable key fragment identifying this shape within a generation.
    pub fn cache_fragment(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Locale(locale) => format!("locale:{}", locale),
            Self::Tags { tags, locale } => {
                let mut material = tags.join("\n");
                material.push('\0');
                material.push_str(locale.as_deref().unwrap_or(""));
                format!("tags:{}", hex::encode(compute_content_hash(material.as_bytes())))
            }
            Self::Locales => "locales".to_string(),
        }
    }

    /// The row scan backing this shape. `Locales` is not a row export.
    pub fn scan(&self) -> Option<ExportScan> {
        match self {
            Self::All => Some(ExportScan::default()),
            Self::Locale(locale) => Some(ExportScan {
                locale: Some(locale.clone()),
                tags: Vec::new(),
            }),
            Self::Tags { tags, locale } => Some(ExportScan {
                locale: locale.clone(),
                tags: tags.clone(),
            }),
            Self::Locales => None,
        }
    }

    /// Whether the body nests keys under locale objects.
    pub fn is_grouped(&self) -> bool {
        matches!(self, Self::All | Self::Tags { .. })
    }
}

/// Filter for an ordered export scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportScan {
    pub locale: Option<String>,
    /// OR-matched tag names. Empty means every row.
    pub tags: Vec<String>,
}

/// Keyset position: the last `(locale, key)` already emitted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExportCursor {
    pub locale: String,
    pub key: String,
}

/// A row as read by an export scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub locale: String,
    pub key: String,
    pub value: String,
}

impl ExportRow {
    pub fn new(locale: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn cursor(&self) -> ExportCursor {
        ExportCursor {
            locale: self.locale.clone(),
            key: self.key.clone(),
        }
    }
}
