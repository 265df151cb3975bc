//! Listing filters and offset pagination.

use serde::{Deserialize, Serialize};

/// Default page size for listings.
pub const DEFAULT_PER_PAGE: u32 = 15;

/// Filters accepted by translation listing and search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationFilter {
    /// Exact locale match.
    pub locale: Option<String>,
    /// Key prefix match.
    pub key_prefix: Option<String>,
    /// Case-insensitive substring over key and value.
    pub query: Option<String>,
    /// OR-matched tag names. Empty means no tag restriction.
    pub tags: Vec<String>,
}

/// Filters accepted by tag listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    /// Case-insensitive substring over the tag name.
    pub search: Option<String>,
}

/// A 1-based page request with a bounded page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl PageRequest {
    /// Build a page request, clamping `per_page` to `1..=max_per_page`.
    pub fn new(page: Option<u32>, per_page: Option<u32>, max_per_page: u32) -> Self {
        let page = page.unwrap_or(1).max(1);
        let per_page = per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, max_per_page.max(1));
        Self { page, per_page }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }
}

/// One page of results plus totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, request: PageRequest, total: u64) -> Self {
        let per_page = u64::from(request.per_page());
        let last_page = total.div_ceil(per_page).max(1);
        Self {
            data,
            page: request.page(),
            per_page: request.per_page(),
            total,
            last_page: u32::try_from(last_page).unwrap_or(u32::MAX),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            last_page: self.last_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamps_per_page() {
        let req = PageRequest::new(Some(2), Some(500), 100);
        assert_eq!(req.per_page(), 100);
        assert_eq!(req.offset(), 100);

        let req = PageRequest::new(None, Some(0), 50);
        assert_eq!(req.per_page(), 1);
        assert_eq!(req.page(), 1);
    }

    #[test]
    fn test_page_request_defaults() {
        let req = PageRequest::new(None, None, 100);
        assert_eq!(req.page(), 1);
        assert_eq!(req.per_page(), DEFAULT_PER_PAGE);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_page_last_page() {
        let page = Page::new(vec![1, 2, 3], PageRequest::new(Some(1), Some(3), 100), 10);
        assert_eq!(page.last_page, 4);

        let empty: Page<i32> = Page::new(vec![], PageRequest::new(None, None, 100), 0);
        assert_eq!(empty.last_page, 1);
    }
}
