//! Tag REST API Routes

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use polyglot_core::TagId;
use polyglot_storage::{FreshnessCache, InvalidationHook, SharedStore};
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    extractors::PathId,
    services,
    state::AppState,
    types::{ListTagsQuery, TagPage, TagRequest, TagResponse},
};

/// GET /tags - List tags, optionally filtered by name
#[utoipa::path(
    get,
    path = "/tags",
    tag = "Tags",
    params(ListTagsQuery),
    responses(
        (status = 200, description = "Page of tags", body = TagPage),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn list_tags(
    State(store): State<SharedStore>,
    Query(params): Query<ListTagsQuery>,
) -> ApiResult<Json<TagPage>> {
    let (filter, page) = services::tag_filter(&params);
    let result = store.tag_list(&filter, page).await?;
    Ok(Json(result.into()))
}

/// GET /tags/all - Every tag, from the content cache when warm
#[utoipa::path(
    get,
    path = "/tags/all",
    tag = "Tags",
    responses(
        (status = 200, description = "All tags ordered by name", body = Vec<TagResponse>),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn all_tags(
    State(store): State<SharedStore>,
    State(cache): State<Arc<FreshnessCache>>,
) -> ApiResult<Json<Vec<TagResponse>>> {
    let tags = services::all_tags(store.as_ref(), &cache).await?;
    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}

/// POST /tags - Create a tag
#[utoipa::path(
    post,
    path = "/tags",
    tag = "Tags",
    request_body = TagRequest,
    responses(
        (status = 201, description = "Tag created", body = TagResponse),
        (status = 400, description = "Invalid name", body = ApiError),
        (status = 409, description = "Name already taken", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn create_tag(
    State(store): State<SharedStore>,
    State(hook): State<InvalidationHook>,
    Json(req): Json<TagRequest>,
) -> ApiResult<impl IntoResponse> {
    let tag = services::create_tag(store.as_ref(), &hook, req).await?;
    Ok((StatusCode::CREATED, Json(TagResponse::from(tag))))
}

/// GET /tags/{id} - Get a tag
#[utoipa::path(
    get,
    path = "/tags/{id}",
    tag = "Tags",
    params(
        ("id" = i64, Path, description = "Tag ID")
    ),
    responses(
        (status = 200, description = "Tag details", body = TagResponse),
        (status = 404, description = "Tag not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn get_tag(
    State(store): State<SharedStore>,
    PathId(id): PathId<TagId>,
) -> ApiResult<Json<TagResponse>> {
    let tag = store
        .tag_get(id)
        .await?
        .ok_or_else(|| ApiError::tag_not_found(id))?;
    Ok(Json(tag.into()))
}

/// PUT|PATCH /tags/{id} - Rename a tag
#[utoipa::path(
    patch,
    path = "/tags/{id}",
    tag = "Tags",
    params(
        ("id" = i64, Path, description = "Tag ID")
    ),
    request_body = TagRequest,
    responses(
        (status = 200, description = "Tag renamed", body = TagResponse),
        (status = 400, description = "Invalid name", body = ApiError),
        (status = 404, description = "Tag not found", body = ApiError),
        (status = 409, description = "Name already taken", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn update_tag(
    State(store): State<SharedStore>,
    State(hook): State<InvalidationHook>,
    PathId(id): PathId<TagId>,
    Json(req): Json<TagRequest>,
) -> ApiResult<Json<TagResponse>> {
    let tag = services::update_tag(store.as_ref(), &hook, id, req).await?;
    Ok(Json(tag.into()))
}

/// DELETE /tags/{id} - Delete a tag and detach it from translations
#[utoipa::path(
    delete,
    path = "/tags/{id}",
    tag = "Tags",
    params(
        ("id" = i64, Path, description = "Tag ID")
    ),
    responses(
        (status = 204, description = "Tag deleted"),
        (status = 404, description = "Tag not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn delete_tag(
    State(store): State<SharedStore>,
    State(hook): State<InvalidationHook>,
    PathId(id): PathId<TagId>,
) -> ApiResult<StatusCode> {
    services::delete_tag(store.as_ref(), &hook, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create the tag routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tags).post(create_tag))
        .route("/all", get(all_tags))
        .route(
            "/:id",
            get(get_tag)
                .put(update_tag)
                .patch(update_tag)
                .delete(delete_tag),
        )
}
