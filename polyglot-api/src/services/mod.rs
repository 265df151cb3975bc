//! Service Layer
//!
//! Write paths and cached reads, kept out of the route handlers. Every write
//! calls the invalidation hook after the store returns, unless the store
//! reported that nothing was written.

mod tag_service;
mod translation_service;

pub use tag_service::*;
pub use translation_service::*;

use polyglot_core::{EntityKind, PolyglotError, StorageError};
use polyglot_storage::InvalidationReport;

use crate::telemetry::METRICS;

/// Whether a failed store write may still have committed. Rejections raised
/// before anything is written leave the caches valid.
fn may_have_committed(error: &PolyglotError) -> bool {
    !matches!(
        error,
        PolyglotError::Validation(_)
            | PolyglotError::Storage(
                StorageError::NotFound { .. }
                    | StorageError::Conflict { .. }
                    | StorageError::UnknownTags { .. }
            )
    )
}

fn record_invalidation(kind: EntityKind, report: &InvalidationReport) {
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_invalidation(kind, report);
    }
}
