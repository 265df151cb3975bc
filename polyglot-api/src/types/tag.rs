//! Tag-related API types

use polyglot_core::{Page, Tag, TagId, Timestamp};
use serde::{Deserialize, Serialize};

/// Request to create or rename a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TagRequest {
    /// Unique name, trimmed, at most 50 characters
    pub name: String,
}

/// Query string of `GET /tags`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct ListTagsQuery {
    /// Substring of the tag name
    pub search: Option<String>,
    pub page: Option<u32>,
    /// Page size, at most 100
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TagResponse {
    #[cfg_attr(feature = "openapi", schema(value_type = i64))]
    pub id: TagId,
    pub name: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub updated_at: Timestamp,
}

impl From<Tag> for TagResponse {
    fn from(tag: Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
            created_at: tag.created_at,
            updated_at: tag.updated_at,
        }
    }
}

/// One page of tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TagPage {
    pub data: Vec<TagResponse>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
}

impl From<Page<Tag>> for TagPage {
    fn from(page: Page<Tag>) -> Self {
        let page = page.map(TagResponse::from);
        Self {
            data: page.data,
            page: page.page,
            per_page: page.per_page,
            total: page.total,
            last_page: page.last_page,
        }
    }
}
