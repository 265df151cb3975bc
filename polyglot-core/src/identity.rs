//! Identity types for Polyglot entities

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::Hash;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 content hash.
pub type ContentHash = [u8; 32];

/// Common behavior for the typed id newtypes.
///
/// Ids are database-assigned, strictly ascending integers. The newtypes keep a
/// `TagId` from being passed where a `TranslationId` is expected.
pub trait EntityIdType:
    Copy + Eq + Ord + Hash + fmt::Debug + fmt::Display + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Human readable entity name used in error messages.
    const ENTITY_NAME: &'static str;

    fn new(raw: i64) -> Self;

    fn get(&self) -> i64;
}

macro_rules! define_entity_id {
    ($(#[$meta:meta])* $name:ident, $entity:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
        )]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        #[serde(transparent)]
        pub struct $name(i64);

        impl EntityIdType for $name {
            const ENTITY_NAME: &'static str = $entity;

            fn new(raw: i64) -> Self {
                Self(raw)
            }

            fn get(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

define_entity_id!(
    /// Identifier of a translation row.
    TranslationId,
    "translation"
);
define_entity_id!(
    /// Identifier of a tag.
    TagId,
    "tag"
);
define_entity_id!(UserId, "user");

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}
