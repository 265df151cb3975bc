//! Export REST API Routes
//!
//! Streamed JSON snapshots of the translation set, answered with
//! `304 Not Modified` when the client's `If-None-Match` still matches the
//! current freshness token. The same router is mounted under `/export`
//! (authenticated) and `/public/export`.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::TryStreamExt;
use polyglot_core::ExportShape;
use polyglot_export::ExportEngine;
use polyglot_storage::{FreshnessCache, FreshnessToken, SharedStore};
use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    error::{ApiError, ApiResult},
    negotiate::{negotiate, Negotiation},
    services,
    state::AppState,
    telemetry::{metrics::ExportOutcome, METRICS},
    types::{ExportTagsQuery, LocalesResponse},
    validation::{split_csv, validate_locale, validate_tag_names},
};

const NO_CACHE: HeaderValue = HeaderValue::from_static("no-cache");

fn etag_value(token: &FreshnessToken) -> Option<HeaderValue> {
    HeaderValue::from_str(&token.to_etag()).ok()
}

fn if_none_match(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
}

fn record(shape: &ExportShape, outcome: ExportOutcome) {
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_export(shape.kind(), outcome);
    }
}

fn not_modified(token: &FreshnessToken) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, NO_CACHE);
    if let Some(etag) = etag_value(token) {
        headers.insert(header::ETAG, etag);
    }
    response
}

/// Resolve the freshness token for a request that needs a body. A missing
/// token means the cache is unreachable; the body is still served.
async fn fresh_token(cache: &FreshnessCache, shape: &ExportShape) -> Option<FreshnessToken> {
    let token = cache.ensure_token(shape).await;
    if token.is_none() {
        debug!(shape = shape.kind(), "serving export without ETag");
        if let Ok(metrics) = METRICS.as_ref() {
            metrics.record_cache_degraded("ensure_token");
        }
    }
    token
}

/// Answer one export request: 304 when the validator matches, otherwise a
/// streamed body carrying the current token.
async fn conditional_export(
    cache: &FreshnessCache,
    exports: &ExportEngine,
    headers: &HeaderMap,
    shape: ExportShape,
) -> ApiResult<Response> {
    let current = cache.get_token(&shape).await;
    if let (Negotiation::NotModified, Some(token)) =
        (negotiate(if_none_match(headers), current.as_ref()), &current)
    {
        record(&shape, ExportOutcome::NotModified);
        return Ok(not_modified(token));
    }

    let token = fresh_token(cache, &shape).await;
    let kind = shape.kind();
    let stream = exports.stream(&shape)?.inspect_err(move |e| {
        error!(shape = kind, error = %e, "export stream aborted");
    });

    let mut response = Response::new(Body::from_stream(stream));
    let response_headers = response.headers_mut();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response_headers.insert(header::CACHE_CONTROL, NO_CACHE);
    if let Some(etag) = token.as_ref().and_then(etag_value) {
        response_headers.insert(header::ETAG, etag);
    }

    record(&shape, ExportOutcome::Streamed);
    Ok(response)
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /export - Every translation grouped by locale
#[utoipa::path(
    get,
    path = "/export",
    tag = "Export",
    params(
        ("If-None-Match" = Option<String>, Header, description = "ETag from a previous export")
    ),
    responses(
        (status = 200, description = "JSON object of locale to key-value map"),
        (status = 304, description = "Client copy is current"),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        (),
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn export_all(
    State(cache): State<Arc<FreshnessCache>>,
    State(exports): State<ExportEngine>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    conditional_export(&cache, &exports, &headers, ExportShape::All).await
}

/// GET /export/{locale} - One locale as a flat key-value object
#[utoipa::path(
    get,
    path = "/export/{locale}",
    tag = "Export",
    params(
        ("locale" = String, Path, description = "Locale code"),
        ("If-None-Match" = Option<String>, Header, description = "ETag from a previous export")
    ),
    responses(
        (status = 200, description = "JSON object of key to value"),
        (status = 304, description = "Client copy is current"),
        (status = 400, description = "Invalid locale", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        (),
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn export_locale(
    State(cache): State<Arc<FreshnessCache>>,
    State(exports): State<ExportEngine>,
    Path(locale): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let shape = ExportShape::locale(validate_locale(&locale)?);
    conditional_export(&cache, &exports, &headers, shape).await
}

/// GET /export/tags - Translations carrying any of the given tags
#[utoipa::path(
    get,
    path = "/export/tags",
    tag = "Export",
    params(
        ExportTagsQuery,
        ("If-None-Match" = Option<String>, Header, description = "ETag from a previous export")
    ),
    responses(
        (status = 200, description = "JSON object of locale to key-value map"),
        (status = 304, description = "Client copy is current"),
        (status = 400, description = "No tags given", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        (),
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn export_tags(
    State(cache): State<Arc<FreshnessCache>>,
    State(exports): State<ExportEngine>,
    Query(params): Query<ExportTagsQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let names = validate_tag_names(&split_csv(params.tags.as_deref()))?;
    let locale = params.locale.as_deref().map(validate_locale).transpose()?;
    let shape = ExportShape::tags(names, locale).ok_or_else(|| ApiError::missing_field("tags"))?;
    conditional_export(&cache, &exports, &headers, shape).await
}

/// GET /export/locales - Distinct locales present in the store
#[utoipa::path(
    get,
    path = "/export/locales",
    tag = "Export",
    params(
        ("If-None-Match" = Option<String>, Header, description = "ETag from a previous response")
    ),
    responses(
        (status = 200, description = "Locales in ascending order", body = LocalesResponse),
        (status = 304, description = "Client copy is current"),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        (),
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn export_locales(
    State(store): State<SharedStore>,
    State(cache): State<Arc<FreshnessCache>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let shape = ExportShape::Locales;
    let current = cache.get_token(&shape).await;
    if let (Negotiation::NotModified, Some(token)) =
        (negotiate(if_none_match(&headers), current.as_ref()), &current)
    {
        record(&shape, ExportOutcome::NotModified);
        return Ok(not_modified(token));
    }

    let token = fresh_token(&cache, &shape).await;
    let locales = services::all_locales(store.as_ref(), &cache).await?;

    let mut response = Json(LocalesResponse { locales }).into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(header::CACHE_CONTROL, NO_CACHE);
    if let Some(etag) = token.as_ref().and_then(etag_value) {
        response_headers.insert(header::ETAG, etag);
    }

    record(&shape, ExportOutcome::Streamed);
    Ok(response)
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the export routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(export_all))
        .route("/locales", get(export_locales))
        .route("/tags", get(export_tags))
        .route("/:locale", get(export_locale))
}
