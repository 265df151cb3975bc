//! Custom path extractors for type-safe entity IDs.
//!
//! Provides `PathId<T>` extractor that works with EntityIdType newtypes
//! and provides rich error messages.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use polyglot_core::EntityIdType;

use crate::error::ErrorCode;

/// Extractor for type-safe entity IDs from path parameters.
///
/// Unlike the standard `Path<i64>` extractor, `PathId<T>` provides:
/// - Type-safe extraction into specific ID types (TranslationId, TagId)
/// - Rich error messages with entity type context
///
/// # Example
///
/// ```rust,ignore
/// use polyglot_core::TranslationId;
///
/// async fn get_translation(
///     PathId(id): PathId<TranslationId>,
/// ) -> ApiResult<impl IntoResponse> {
///     // id is TranslationId, not i64
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PathId<T: EntityIdType>(pub T);

/// Error returned when PathId extraction fails.
#[derive(Debug, thiserror::Error)]
#[error("Invalid {entity_name} ID '{path_param}': {message}")]
pub struct PathIdError {
    pub entity_name: &'static str,
    pub path_param: String,
    pub message: String,
}

impl IntoResponse for PathIdError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "code": ErrorCode::InvalidFormat,
            "message": self.to_string(),
            "details": {
                "entity_type": self.entity_name,
                "path_param": self.path_param,
            },
        });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

#[async_trait]
impl<S, T> FromRequestParts<S> for PathId<T>
where
    S: Send + Sync,
    T: EntityIdType,
{
    type Rejection = PathIdError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw): Path<String> =
            Path::from_request_parts(parts, state)
                .await
                .map_err(|e| PathIdError {
                    entity_name: T::ENTITY_NAME,
                    path_param: parts.uri.path().to_string(),
                    message: format!("Failed to extract path parameter: {}", e),
                })?;

        let id: i64 = raw.parse().map_err(|_| PathIdError {
            entity_name: T::ENTITY_NAME,
            path_param: raw.clone(),
            message: "expected a positive integer".to_string(),
        })?;
        if id <= 0 {
            return Err(PathIdError {
                entity_name: T::ENTITY_NAME,
                path_param: raw,
                message: "expected a positive integer".to_string(),
            });
        }

        Ok(PathId(T::new(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use polyglot_core::TagId;
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new().route(
            "/tags/:id",
            get(|PathId(id): PathId<TagId>| async move { id.get().to_string() }),
        )
    }

    #[tokio::test]
    async fn test_path_id_parses_integer() {
        let response = app()
            .oneshot(Request::builder().uri("/tags/42").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"42");
    }

    #[tokio::test]
    async fn test_path_id_rejects_non_numeric() {
        let response = app()
            .oneshot(Request::builder().uri("/tags/abc").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["details"]["entity_type"], "tag");
    }

    #[tokio::test]
    async fn test_path_id_rejects_zero() {
        let response = app()
            .oneshot(Request::builder().uri("/tags/0").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
