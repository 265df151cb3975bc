//! Login and Logout Endpoints
//!
//! - POST /login - Exchange email and password for a bearer token (public)
//! - POST /logout - Revoke the bearer token used for the request

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use polyglot_core::EntityIdType;
use polyglot_storage::SharedUserStore;
use tracing::{info, warn};

use crate::{
    auth::{generate_jwt_token, verify_password},
    error::{ApiError, ApiResult},
    middleware::{AuthExtractor, AuthMiddlewareState},
    state::AppState,
    types::{LoginRequest, LoginResponse, UserSummary},
};

/// POST /login - Issue a JWT for valid credentials
#[utoipa::path(
    post,
    path = "/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "Missing email or password", body = ApiError),
        (status = 401, description = "Invalid credentials", body = ApiError),
    ),
)]
pub async fn login(
    State(users): State<SharedUserStore>,
    State(auth): State<AuthMiddlewareState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let email = req.email.trim();
    if email.is_empty() {
        return Err(ApiError::missing_field("email"));
    }
    if req.password.is_empty() {
        return Err(ApiError::missing_field("password"));
    }

    let user = users
        .user_find_by_email(email)
        .await?
        .filter(|user| verify_password(user, &req.password))
        .ok_or_else(|| {
            warn!(email = %email, "login rejected");
            ApiError::unauthorized("Invalid email or password")
        })?;

    let (token, claims) = generate_jwt_token(&auth.auth_config, user.id.get().to_string())?;
    info!(user_id = %user.id, "login succeeded");

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_at: claims.exp,
        user: UserSummary {
            id: user.id.get(),
            email: user.email,
            name: user.name,
        },
    }))
}

/// POST /logout - Revoke the current bearer token
///
/// Requests authenticated by API key have no token to revoke and succeed
/// without effect.
#[utoipa::path(
    post,
    path = "/logout",
    tag = "Auth",
    responses(
        (status = 204, description = "Token revoked"),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn logout(
    State(auth): State<AuthMiddlewareState>,
    AuthExtractor(ctx): AuthExtractor,
) -> StatusCode {
    if let Some((jti, exp)) = ctx.token {
        auth.revocations.revoke(jti, exp);
        let now = auth.auth_config.clock.now_epoch_secs();
        let purged = auth.revocations.purge_expired(now);
        info!(user_id = %ctx.user_id, purged, "token revoked");
    }
    StatusCode::NO_CONTENT
}

/// Public login route.
pub fn create_public_router() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

/// Logout route; mount behind the auth middleware.
pub fn create_router() -> Router<AppState> {
    Router::new().route("/logout", post(logout))
}
