//! Cache key layout.
//!
//! Freshness-token keys embed the generation they were minted in. A token key
//! can only be built from a [`Generation`] and an [`ExportShape`], so every
//! token lookup is scoped to a generation by construction.

use polyglot_core::ExportShape;
use std::fmt;

/// Key holding the generation counter.
pub const GENERATION_KEY: &str = "etag:generation";

/// Content cache for the full tag listing.
pub const TAGS_ALL_CONTENT_KEY: &str = "content:tags:all";

/// Content cache for the locale listing.
pub const LOCALES_CONTENT_KEY: &str = "content:locales";

/// Monotonic counter bumped by every translation-affecting write.
///
/// Tokens minted under an older generation are unreachable once the counter
/// moves on, whether or not their keys were physically deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The generation this one replaced. Generation zero has none.
    pub fn previous(&self) -> Option<Generation> {
        self.0.checked_sub(1).map(Generation)
    }

    pub fn is_newer_than(&self, other: &Generation) -> bool {
        self.0 > other.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Key of the freshness token for one export shape in one generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey {
    inner: TokenKeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TokenKeyInner {
    generation: Generation,
    fragment: String,
}

impl TokenKey {
    pub fn new(generation: Generation, shape: &ExportShape) -> Self {
        Self {
            inner: TokenKeyInner {
                generation,
                fragment: shape.cache_fragment(),
            },
        }
    }

    /// Key for the per-locale token without building a shape.
    pub fn for_locale(generation: Generation, locale: &str) -> Self {
        Self {
            inner: TokenKeyInner {
                generation,
                fragment: format!("locale:{}", locale),
            },
        }
    }

    pub fn generation(&self) -> Generation {
        self.inner.generation
    }

    /// Encode to the string stored in the backend, e.g. `etag:g3:locale:en`.
    pub fn encode(&self) -> String {
        format!("etag:{}:{}", self.inner.generation, self.inner.fragment)
    }

    /// Prefix covering every token of a generation.
    pub fn generation_prefix(generation: Generation) -> String {
        format!("etag:{}:", generation)
    }

    /// Prefix covering every per-locale token of a generation.
    pub fn locale_prefix(generation: Generation) -> String {
        format!("etag:{}:locale:", generation)
    }

    /// Prefix covering every tag-filtered token of a generation.
    pub fn tags_prefix(generation: Generation) -> String {
        format!("etag:{}:tags:", generation)
    }
}
