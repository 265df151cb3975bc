//! Polyglot Core - Entity Types
//!
//! Pure data structures shared by every other crate: ids, translation and tag
//! records, listing filters, export shapes, and the error taxonomy.

pub mod entities;
pub mod error;
pub mod export;
pub mod filter;
pub mod identity;

pub use entities::{
    normalize_tag_name, normalize_tag_names, NewTranslation, NewUser, Tag, Translation,
    TranslationPatch, TranslationWithTags, UserCredentials, LOCALE_MAX_LEN, TAG_NAME_MAX_LEN,
    TRANSLATION_KEY_MAX_LEN,
};
pub use error::{
    CacheError, ConfigError, PolyglotError, PolyglotResult, StorageError, ValidationError,
};
pub use export::{EntityKind, ExportCursor, ExportRow, ExportScan, ExportShape};
pub use filter::{Page, PageRequest, TagFilter, TranslationFilter, DEFAULT_PER_PAGE};
pub use identity::{
    compute_content_hash, ContentHash, EntityIdType, TagId, Timestamp, TranslationId, UserId,
};
