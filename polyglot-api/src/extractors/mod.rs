//! Custom Axum extractors.

mod path_id;

pub use path_id::{PathId, PathIdError};
