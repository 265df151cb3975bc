//! Export-related API types

use serde::{Deserialize, Serialize};

/// Query string of `GET /export/tags`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct ExportTagsQuery {
    /// Comma separated tag names; rows with any of them are exported
    pub tags: Option<String>,
    /// Restrict the export to one locale
    pub locale: Option<String>,
}

/// Locales present in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LocalesResponse {
    /// Ascending
    pub locales: Vec<String>,
}
