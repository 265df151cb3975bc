//! Export errors.

use polyglot_core::PolyglotError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    /// A chunk read failed. The stream ends after yielding this.
    #[error("export scan failed: {0}")]
    Store(#[from] PolyglotError),

    /// The store returned a row that sorts before one already written.
    #[error("rows out of order: '{next}' after '{previous}'")]
    OutOfOrder { previous: String, next: String },

    /// The writer was driven through an invalid transition.
    #[error("writer misuse: {0}")]
    WriterState(&'static str),

    #[error("shape '{0}' is not a row export")]
    UnsupportedShape(&'static str),

    #[error("encoding failed: {0}")]
    Encode(String),
}

pub type ExportResult<T> = Result<T, ExportError>;
