//! OpenAPI Specification for the Polyglot API
//!
//! Generated by utoipa from the route annotations and request/response types.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{CacheHealth, ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::{auth, export, health, tag, translation};
use crate::types::*;

/// OpenAPI document for the Polyglot API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Polyglot API",
        version = "0.1.0",
        description = "Translation management with tagged keys and cache-validated JSON exports",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Translations", description = "Keyed, localized strings and their tags"),
        (name = "Tags", description = "Labels grouping translations"),
        (name = "Export", description = "Streamed JSON snapshots with ETag validation"),
        (name = "Auth", description = "Token issue and revocation"),
        (name = "Health", description = "Liveness and readiness checks"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        translation::list_translations,
        translation::search_translations,
        translation::create_translation,
        translation::get_translation,
        translation::update_translation,
        translation::delete_translation,

        tag::list_tags,
        tag::all_tags,
        tag::create_tag,
        tag::get_tag,
        tag::update_tag,
        tag::delete_tag,

        export::export_all,
        export::export_locale,
        export::export_tags,
        export::export_locales,

        auth::login,
        auth::logout,

        health::ping,
        health::liveness,
        health::readiness,

        crate::telemetry::metrics::metrics_handler,
    ),
    components(
        schemas(
            ApiError, ErrorCode,

            CreateTranslationRequest, UpdateTranslationRequest,
            TranslationResponse, TranslationPage,

            TagRequest, TagResponse, TagPage,

            LocalesResponse,

            LoginRequest, LoginResponse, UserSummary,

            HealthResponse, HealthStatus, HealthDetails, ComponentHealth, CacheHealth,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security scheme modifier for OpenAPI document.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );

            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Token issued by POST /login"))
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
