//! Error types for Polyglot operations

use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Conflict on {entity}: {reason}")]
    Conflict { entity: &'static str, reason: String },

    #[error("Unknown tags: {names:?}")]
    UnknownTags { names: Vec<String> },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Query failed during {operation}: {reason}")]
    QueryFailed { operation: String, reason: String },

    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Value for {field} is too long: {len} > {max}")]
    TooLong { field: String, len: usize, max: usize },
}

/// Cache backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache transaction failed: {reason}")]
    Transaction { reason: String },

    #[error("Corrupt cache entry at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Cache serialization failed: {reason}")]
    Serialization { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Polyglot errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolyglotError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Polyglot operations.
pub type PolyglotResult<T> = Result<T, PolyglotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            entity: "translation",
            id: 12,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Entity not found"));
        assert!(msg.contains("translation"));
        assert!(msg.contains("12"));
    }

    #[test]
    fn test_storage_error_display_conflict() {
        let err = StorageError::Conflict {
            entity: "tag",
            reason: "name already taken".to_string(),
        };
        assert_eq!(err.to_string(), "Conflict on tag: name already taken");
    }

    #[test]
    fn test_validation_error_display_too_long() {
        let err = ValidationError::TooLong {
            field: "name".to_string(),
            len: 51,
            max: 50,
        };
        assert_eq!(err.to_string(), "Value for name is too long: 51 > 50");
    }

    #[test]
    fn test_polyglot_error_from_variants() {
        let err: PolyglotError = CacheError::Unavailable {
            reason: "closed".to_string(),
        }
        .into();
        assert!(matches!(err, PolyglotError::Cache(_)));
        assert!(err.to_string().starts_with("Cache error:"));

        let err: PolyglotError = ConfigError::MissingRequired {
            field: "POLYGLOT_JWT_SECRET".to_string(),
        }
        .into();
        assert!(matches!(err, PolyglotError::Config(_)));
    }
}
