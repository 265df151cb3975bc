//! Polyglot Export - Streaming JSON Snapshots
//!
//! Turns an ordered, chunked scan of the record store into a JSON byte stream
//! without ever holding the full result in memory.

pub mod engine;
pub mod error;
pub mod writer;

pub use engine::{ExportConfig, ExportEngine, ExportStream, DEFAULT_CHUNK_SIZE};
pub use error::{ExportError, ExportResult};
pub use writer::{ExportWriter, Layout};
