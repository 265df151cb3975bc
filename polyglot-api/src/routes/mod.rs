//! REST API Routes Module
//!
//! Route handlers organized by resource:
//! - Translation and tag CRUD (authenticated)
//! - Streamed exports, authenticated under `/export` and public under
//!   `/public/export`
//! - Login (public) and logout (authenticated)
//! - Health checks, metrics, and the OpenAPI document (public)

pub mod auth;
pub mod export;
pub mod health;
pub mod tag;
pub mod translation;

use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::config::{is_production_environment, ApiConfig};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth_middleware;
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use export::create_router as export_router;
pub use health::create_router as health_router;
pub use tag::create_router as tag_router;
pub use translation::create_router as translation_router;

// ============================================================================
// OPENAPI ENDPOINT
// ============================================================================

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// PRODUCTION VALIDATION
// ============================================================================

/// Validate API configuration for production use.
fn validate_api_config_for_production(config: &ApiConfig) -> ApiResult<()> {
    if config.cors_origins.is_empty() {
        return Err(ApiError::invalid_input(
            "CORS origins not configured for production. Set POLYGLOT_CORS_ORIGINS.",
        ));
    }
    Ok(())
}

// ============================================================================
// SECURE ROUTER BUILDER
// ============================================================================

/// Builder for the API router with authentication on by default.
///
/// Every resource route sits behind the auth middleware. Public routes
/// (login, public exports, health, metrics, OpenAPI) are mounted separately
/// and still pass through observability and CORS.
pub struct SecureRouterBuilder {
    state: AppState,
}

impl SecureRouterBuilder {
    /// Create a new SecureRouterBuilder.
    ///
    /// In production environments, this validates that security configurations
    /// are properly set up and returns an error if critical settings are missing.
    pub fn new(state: AppState) -> ApiResult<Self> {
        if is_production_environment() {
            state.auth.auth_config.validate_for_production()?;
            validate_api_config_for_production(&state.config)?;
        }
        Ok(Self { state })
    }

    /// Routes that require an API key or bearer token.
    fn build_protected_routes(&self) -> Router<AppState> {
        Router::new()
            .nest("/translations", translation::create_router())
            .nest("/tags", tag::create_router())
            .nest("/export", export::create_router())
            .merge(auth::create_router())
            .layer(from_fn_with_state(self.state.auth.clone(), auth_middleware))
    }

    /// Build the complete router with full security stack.
    ///
    /// # Middleware Order (outer to inner)
    /// 1. CORS (outermost) - handles preflight requests
    /// 2. Trace - request spans from tower-http
    /// 3. Observability - request metrics
    /// 4. Auth (innermost, protected routes only) - validates credentials
    pub fn build(self) -> Router {
        let mut router = Router::new()
            .merge(self.build_protected_routes())
            .nest("/public/export", export::create_router())
            .merge(auth::create_public_router())
            .nest("/health", health::create_router())
            .route("/metrics", get(metrics_handler))
            .route("/openapi.json", get(openapi_json));

        #[cfg(feature = "swagger-ui")]
        {
            use utoipa_swagger_ui::SwaggerUi;
            router = router.merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", ApiDoc::openapi()));
        }

        let cors = build_cors_layer(&self.state.config);

        router
            .with_state(self.state)
            .layer(from_fn(observability_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::IF_NONE_MATCH,
            HeaderName::from_static("x-api-key"),
        ])
        .expose_headers([header::ETAG, header::CACHE_CONTROL])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any).allow_headers(Any).expose_headers(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

/// Create the complete API router.
///
/// - Translations, tags, exports and logout require authentication
/// - `/public/export/*` and `/login` are open
/// - Health checks at /health/*, metrics at /metrics, OpenAPI at /openapi.json
/// - Swagger UI at /swagger-ui (when swagger-ui feature is enabled)
///
/// In production, the security configuration is validated before any route
/// is built.
pub fn create_api_router(state: AppState) -> ApiResult<Router> {
    SecureRouterBuilder::new(state).map(SecureRouterBuilder::build)
}
