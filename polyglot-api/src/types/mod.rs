//! API Request and Response Types
//!
//! Request bodies, query strings, and response envelopes for the REST surface.

// Translation types
mod translation;
pub use translation::*;

// Tag types
mod tag;
pub use tag::*;

// Export types
mod export;
pub use export::*;

// Login types
mod auth;
pub use auth::*;
