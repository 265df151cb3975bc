//! Polyglot API - REST Layer for Translation Management
//!
//! Axum routes over the record store, the streaming export engine, and the
//! freshness cache. Writes invalidate cached export tokens after they commit;
//! export reads answer `If-None-Match` with `304 Not Modified` when the
//! client's copy is still current.

#[macro_use]
pub mod macros;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod negotiate;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use auth::{
    authenticate, generate_jwt_token, hash_password, generate_salt, validate_api_key,
    validate_jwt_token, verify_password, AuthConfig, AuthContext, AuthMethod, Claims,
    RevocationList,
};
pub use config::{ApiConfig, CacheBackendKind, StoreBackend};
pub use db::{DbConfig, PgStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{auth_middleware, AuthExtractor, AuthMiddlewareState};
pub use negotiate::{negotiate, Negotiation};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::AppState;
pub use types::*;
