//! Translation REST API Routes
//!
//! CRUD, listing, and search over translations. Writes go through the
//! translation service so caches are invalidated after the store commits.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use polyglot_core::TranslationId;
use polyglot_storage::{InvalidationHook, SharedStore};

use crate::{
    error::{ApiError, ApiResult},
    extractors::PathId,
    services,
    state::AppState,
    types::{
        CreateTranslationRequest, ListTranslationsQuery, SearchTranslationsQuery,
        TranslationPage, TranslationResponse, UpdateTranslationRequest,
    },
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /translations - List translations with filters
#[utoipa::path(
    get,
    path = "/translations",
    tag = "Translations",
    params(ListTranslationsQuery),
    responses(
        (status = 200, description = "Page of translations", body = TranslationPage),
        (status = 400, description = "Invalid filter", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn list_translations(
    State(store): State<SharedStore>,
    Query(params): Query<ListTranslationsQuery>,
) -> ApiResult<Json<TranslationPage>> {
    let (filter, page) = services::list_filter(&params)?;
    let result = store.translation_list(&filter, page).await?;
    Ok(Json(result.into()))
}

/// GET /translations/search - Search keys and values
#[utoipa::path(
    get,
    path = "/translations/search",
    tag = "Translations",
    params(SearchTranslationsQuery),
    responses(
        (status = 200, description = "Page of matching translations", body = TranslationPage),
        (status = 400, description = "Missing or short search term", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn search_translations(
    State(store): State<SharedStore>,
    Query(params): Query<SearchTranslationsQuery>,
) -> ApiResult<Json<TranslationPage>> {
    let (filter, page) = services::search_filter(&params)?;
    let result = store.translation_list(&filter, page).await?;
    Ok(Json(result.into()))
}

/// POST /translations - Create a translation
#[utoipa::path(
    post,
    path = "/translations",
    tag = "Translations",
    request_body = CreateTranslationRequest,
    responses(
        (status = 201, description = "Translation created", body = TranslationResponse),
        (status = 400, description = "Invalid request or unknown tag", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 409, description = "Key already exists for this locale", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn create_translation(
    State(store): State<SharedStore>,
    State(hook): State<InvalidationHook>,
    Json(req): Json<CreateTranslationRequest>,
) -> ApiResult<impl IntoResponse> {
    let created = services::create_translation(store.as_ref(), &hook, req).await?;
    Ok((StatusCode::CREATED, Json(TranslationResponse::from(created))))
}

/// GET /translations/{id} - Get a translation
#[utoipa::path(
    get,
    path = "/translations/{id}",
    tag = "Translations",
    params(
        ("id" = i64, Path, description = "Translation ID")
    ),
    responses(
        (status = 200, description = "Translation details", body = TranslationResponse),
        (status = 404, description = "Translation not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn get_translation(
    State(store): State<SharedStore>,
    PathId(id): PathId<TranslationId>,
) -> ApiResult<Json<TranslationResponse>> {
    let translation = store
        .translation_get(id)
        .await?
        .ok_or_else(|| ApiError::translation_not_found(id))?;

    Ok(Json(translation.into()))
}

/// PUT|PATCH /translations/{id} - Update a translation
///
/// Omitted fields are left unchanged. A present `tags` list replaces the
/// translation's tags entirely.
#[utoipa::path(
    patch,
    path = "/translations/{id}",
    tag = "Translations",
    params(
        ("id" = i64, Path, description = "Translation ID")
    ),
    request_body = UpdateTranslationRequest,
    responses(
        (status = 200, description = "Translation updated", body = TranslationResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Translation not found", body = ApiError),
        (status = 409, description = "Key already exists for this locale", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn update_translation(
    State(store): State<SharedStore>,
    State(hook): State<InvalidationHook>,
    PathId(id): PathId<TranslationId>,
    Json(req): Json<UpdateTranslationRequest>,
) -> ApiResult<Json<TranslationResponse>> {
    let updated = services::update_translation(store.as_ref(), &hook, id, req).await?;
    Ok(Json(updated.into()))
}

/// DELETE /translations/{id} - Delete a translation
#[utoipa::path(
    delete,
    path = "/translations/{id}",
    tag = "Translations",
    params(
        ("id" = i64, Path, description = "Translation ID")
    ),
    responses(
        (status = 204, description = "Translation deleted"),
        (status = 404, description = "Translation not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn delete_translation(
    State(store): State<SharedStore>,
    State(hook): State<InvalidationHook>,
    PathId(id): PathId<TranslationId>,
) -> ApiResult<StatusCode> {
    services::delete_translation(store.as_ref(), &hook, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the translation routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_translations).post(create_translation))
        .route("/search", get(search_translations))
        .route(
            "/:id",
            get(get_translation)
                .put(update_translation)
                .patch(update_translation)
                .delete(delete_translation),
        )
}
