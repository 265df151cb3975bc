//! Router-level tests against the in-memory store and cache backends.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use polyglot_api::auth::JwtSecret;
use polyglot_api::{create_api_router, hash_password, ApiConfig, AppState, AuthConfig};
use polyglot_core::NewUser;
use polyglot_storage::{CacheBackend, InMemoryCacheBackend, InMemoryStore};
use polyglot_test_utils::assertions::parse_export;
use polyglot_test_utils::fixtures::{grouping_rows, seed, store_with_rows};
use polyglot_test_utils::UnavailableCacheBackend;
use serde_json::{json, Value};
use tower::ServiceExt;

const API_KEY: &str = "integration-test-key";

fn test_auth_config() -> AuthConfig {
    let mut config = AuthConfig::default();
    config.add_api_key(API_KEY.to_string());
    config.jwt_secret =
        JwtSecret::new("integration-test-secret-0123456789abcdef".to_string()).unwrap();
    config
}

fn app(store: Arc<InMemoryStore>, backend: Arc<dyn CacheBackend>) -> Router {
    let state = AppState::new(
        store.clone(),
        store,
        backend,
        ApiConfig::default(),
        test_auth_config(),
    );
    create_api_router(state).unwrap()
}

async fn seeded_app() -> (Router, Arc<InMemoryStore>) {
    let store = store_with_rows(&grouping_rows()).await;
    (app(store.clone(), Arc::new(InMemoryCacheBackend::new())), store)
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl TestResponse {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn etag(&self) -> Option<String> {
        self.headers
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-api-key", API_KEY)
        .body(Body::empty())
        .unwrap()
}

fn get_if_none_match(uri: &str, etag: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-api-key", API_KEY)
        .header(header::IF_NONE_MATCH, etag)
        .body(Body::empty())
        .unwrap()
}

fn with_json(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", API_KEY)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header("x-api-key", API_KEY)
        .body(Body::empty())
        .unwrap()
}

async fn translation_id(app: &Router, locale: &str, key: &str) -> i64 {
    let page = send(app, get(&format!("/translations?locale={}&key={}", locale, key)))
        .await
        .json();
    page["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["key"] == key)
        .and_then(|t| t["id"].as_i64())
        .unwrap()
}

async fn tag_id(app: &Router, name: &str) -> i64 {
    let tags = send(app, get("/tags/all")).await.json();
    tags.as_array()
        .unwrap()
        .iter()
        .find(|t| t["name"] == name)
        .and_then(|t| t["id"].as_i64())
        .unwrap()
}

// ============================================================================
// CRUD
// ============================================================================

#[tokio::test]
async fn test_create_and_get_translation_with_tags() {
    let (app, _) = seeded_app().await;

    let created = send(
        &app,
        with_json(
            Method::POST,
            "/translations",
            json!({"key": "home.title", "locale": "en", "value": "Welcome", "tags": ["web", "mobile"]}),
        ),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.json()["id"].as_i64().unwrap();

    let fetched = send(&app, get(&format!("/translations/{}", id))).await;
    assert_eq!(fetched.status, StatusCode::OK);
    let body = fetched.json();
    assert_eq!(body["value"], "Welcome");
    assert_eq!(body["tags"], json!(["mobile", "web"]));
}

#[tokio::test]
async fn test_duplicate_key_and_locale_conflicts() {
    let (app, _) = seeded_app().await;
    let response = send(
        &app,
        with_json(
            Method::POST,
            "/translations",
            json!({"key": "a", "locale": "en", "value": "again"}),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.json()["code"], "ENTITY_ALREADY_EXISTS");
}

#[tokio::test]
async fn test_unknown_tag_is_rejected() {
    let (app, _) = seeded_app().await;
    let response = send(
        &app,
        with_json(
            Method::POST,
            "/translations",
            json!({"key": "c", "locale": "en", "value": "3", "tags": ["nope"]}),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_with_no_fields_is_rejected() {
    let (app, _) = seeded_app().await;
    let id = translation_id(&app, "en", "a").await;
    let response = send(
        &app,
        with_json(Method::PATCH, &format!("/translations/{}", id), json!({})),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_translation_then_not_found() {
    let (app, _) = seeded_app().await;
    let id = translation_id(&app, "en", "b").await;

    let deleted = send(&app, delete(&format!("/translations/{}", id))).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let again = send(&app, delete(&format!("/translations/{}", id))).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_path_id_is_bad_request() {
    let (app, _) = seeded_app().await;
    let response = send(&app, get("/translations/abc")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["code"], "INVALID_FORMAT");
}

#[tokio::test]
async fn test_search_requires_two_characters() {
    let (app, _) = seeded_app().await;
    let short = send(&app, get("/translations/search?q=a")).await;
    assert_eq!(short.status, StatusCode::BAD_REQUEST);

    let ok = send(&app, get("/translations/search?q=en")).await;
    assert_eq!(ok.status, StatusCode::OK);
}

#[tokio::test]
async fn test_list_filters_by_tag_union() {
    let (app, _) = seeded_app().await;
    let page = send(&app, get("/translations?tag=web")).await.json();
    assert_eq!(page["total"], 2);

    let page = send(&app, get("/translations?tag=web,mobile")).await.json();
    assert_eq!(page["total"], 3);
}

// ============================================================================
// TAGS AND CASCADE
// ============================================================================

#[tokio::test]
async fn test_deleting_sole_tag_leaves_translation_untagged() {
    let store = store_with_rows(&[("en", "solo", "x", &["only"][..])]).await;
    let app = app(store, Arc::new(InMemoryCacheBackend::new()));
    let tag = tag_id(&app, "only").await;
    let translation = translation_id(&app, "en", "solo").await;

    let deleted = send(&app, delete(&format!("/tags/{}", tag))).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let body = send(&app, get(&format!("/translations/{}", translation)))
        .await
        .json();
    assert_eq!(body["tags"], json!([]));
}

#[tokio::test]
async fn test_deleting_translation_keeps_tags() {
    let (app, _) = seeded_app().await;
    let id = translation_id(&app, "fr", "a").await;
    send(&app, delete(&format!("/translations/{}", id))).await;

    let tags = send(&app, get("/tags/all")).await.json();
    let names: Vec<_> = tags
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["mobile", "web"]);
}

#[tokio::test]
async fn test_tag_name_is_trimmed_and_unique() {
    let (app, _) = seeded_app().await;
    let created = send(
        &app,
        with_json(Method::POST, "/tags", json!({"name": "  desktop  "})),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.json()["name"], "desktop");

    let duplicate = send(&app, with_json(Method::POST, "/tags", json!({"name": "web"}))).await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
}

// ============================================================================
// EXPORTS AND CONDITIONAL REQUESTS
// ============================================================================

#[tokio::test]
async fn test_export_all_groups_by_locale() {
    let (app, _) = seeded_app().await;
    let response = send(&app, get("/export")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.headers.get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(
        response.headers.get(header::CACHE_CONTROL).unwrap(),
        "no-cache"
    );
    assert_eq!(
        parse_export(&response.body),
        json!({"en": {"a": "1", "b": "2"}, "fr": {"a": "3"}})
    );
}

#[tokio::test]
async fn test_export_locale_is_flat() {
    let (app, _) = seeded_app().await;
    let response = send(&app, get("/export/en")).await;
    assert_eq!(parse_export(&response.body), json!({"a": "1", "b": "2"}));
}

#[tokio::test]
async fn test_export_tags_is_union() {
    let (app, _) = seeded_app().await;
    let web = send(&app, get("/export/tags?tags=web")).await;
    assert_eq!(
        parse_export(&web.body),
        json!({"en": {"a": "1"}, "fr": {"a": "3"}})
    );

    let both = send(&app, get("/export/tags?tags=web,mobile")).await;
    assert_eq!(
        parse_export(&both.body),
        json!({"en": {"a": "1", "b": "2"}, "fr": {"a": "3"}})
    );

    let none = send(&app, get("/export/tags")).await;
    assert_eq!(none.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unchanged_export_keeps_token_and_returns_not_modified() {
    let (app, _) = seeded_app().await;
    let first = send(&app, get("/export/en")).await;
    let etag = first.etag().unwrap();

    let second = send(&app, get("/export/en")).await;
    assert_eq!(second.etag().as_deref(), Some(etag.as_str()));

    let conditional = send(&app, get_if_none_match("/export/en", &etag)).await;
    assert_eq!(conditional.status, StatusCode::NOT_MODIFIED);
    assert!(conditional.body.is_empty());
    assert_eq!(conditional.etag().as_deref(), Some(etag.as_str()));
}

#[tokio::test]
async fn test_update_invalidates_export_token() {
    let (app, _) = seeded_app().await;
    let etag = send(&app, get("/export/en")).await.etag().unwrap();

    let id = translation_id(&app, "en", "a").await;
    let updated = send(
        &app,
        with_json(
            Method::PATCH,
            &format!("/translations/{}", id),
            json!({"value": "one"}),
        ),
    )
    .await;
    assert_eq!(updated.status, StatusCode::OK);

    let after = send(&app, get_if_none_match("/export/en", &etag)).await;
    assert_eq!(after.status, StatusCode::OK);
    assert_ne!(after.etag().as_deref(), Some(etag.as_str()));
    assert_eq!(parse_export(&after.body), json!({"a": "one", "b": "2"}));
}

#[tokio::test]
async fn test_tag_rename_invalidates_tag_export() {
    let (app, _) = seeded_app().await;
    let etag = send(&app, get("/export/tags?tags=web")).await.etag().unwrap();

    let id = tag_id(&app, "web").await;
    send(
        &app,
        with_json(Method::PUT, &format!("/tags/{}", id), json!({"name": "site"})),
    )
    .await;

    let after = send(&app, get_if_none_match("/export/tags?tags=web", &etag)).await;
    assert_eq!(after.status, StatusCode::OK);
    assert_eq!(parse_export(&after.body), json!({}));
}

#[tokio::test]
async fn test_locales_listing_is_conditional() {
    let (app, _) = seeded_app().await;
    let first = send(&app, get("/export/locales")).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json(), json!({"locales": ["en", "fr"]}));
    let etag = first.etag().unwrap();

    let conditional = send(&app, get_if_none_match("/export/locales", &etag)).await;
    assert_eq!(conditional.status, StatusCode::NOT_MODIFIED);

    send(
        &app,
        with_json(
            Method::POST,
            "/translations",
            json!({"key": "a", "locale": "de", "value": "eins"}),
        ),
    )
    .await;
    let after = send(&app, get_if_none_match("/export/locales", &etag)).await;
    assert_eq!(after.status, StatusCode::OK);
    assert_eq!(after.json(), json!({"locales": ["de", "en", "fr"]}));
}

#[tokio::test]
async fn test_cache_outage_never_fails_reads_or_writes() {
    let store = store_with_rows(&grouping_rows()).await;
    let app = app(store, Arc::new(UnavailableCacheBackend));

    let created = send(
        &app,
        with_json(
            Method::POST,
            "/translations",
            json!({"key": "c", "locale": "en", "value": "3"}),
        ),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);

    let export = send(&app, get_if_none_match("/export/en", "\"stale\"")).await;
    assert_eq!(export.status, StatusCode::OK);
    assert!(export.etag().is_none());
    assert_eq!(
        parse_export(&export.body),
        json!({"a": "1", "b": "2", "c": "3"})
    );

    let tags = send(&app, get("/tags/all")).await;
    assert_eq!(tags.status, StatusCode::OK);
}

// ============================================================================
// AUTHENTICATION
// ============================================================================

#[tokio::test]
async fn test_protected_routes_require_credentials() {
    let (app, _) = seeded_app().await;
    for uri in ["/translations", "/tags", "/export", "/export/en"] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn test_public_export_needs_no_credentials() {
    let (app, _) = seeded_app().await;
    let request = Request::builder()
        .uri("/public/export/fr")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(parse_export(&response.body), json!({"a": "3"}));
}

async fn login_app() -> Router {
    let store = Arc::new(InMemoryStore::new());
    seed(store.as_ref(), &grouping_rows()).await;
    let salt = "0011223344556677".to_string();
    let password_hash = hash_password(&salt, "correct horse").unwrap();
    polyglot_storage::UserStore::user_upsert(
        store.as_ref(),
        NewUser {
            email: "admin@polyglot.local".to_string(),
            name: "Admin".to_string(),
            password_salt: salt,
            password_hash,
        },
    )
    .await
    .unwrap();
    app(store, Arc::new(InMemoryCacheBackend::new()))
}

fn login_request(password: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"email": "admin@polyglot.local", "password": password}).to_string(),
        ))
        .unwrap()
}

fn bearer(method: Method, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_login_then_logout_revokes_token() {
    let app = login_app().await;

    let login = send(&app, login_request("correct horse")).await;
    assert_eq!(login.status, StatusCode::OK);
    let body = login.json();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["email"], "admin@polyglot.local");
    let token = body["token"].as_str().unwrap().to_string();

    let before = send(&app, bearer(Method::GET, "/translations", &token)).await;
    assert_eq!(before.status, StatusCode::OK);

    let logout = send(&app, bearer(Method::POST, "/logout", &token)).await;
    assert_eq!(logout.status, StatusCode::NO_CONTENT);

    let after = send(&app, bearer(Method::GET, "/translations", &token)).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_with_wrong_password_is_unauthorized() {
    let app = login_app().await;
    let response = send(&app, login_request("wrong")).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// PUBLIC SURFACE
// ============================================================================

#[tokio::test]
async fn test_health_and_openapi_are_public() {
    let (app, _) = seeded_app().await;
    for uri in ["/health/ping", "/health/live", "/health/ready", "/openapi.json"] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status, StatusCode::OK, "{}", uri);
    }
}

#[tokio::test]
async fn test_readiness_reports_degraded_cache() {
    let store = Arc::new(InMemoryStore::new());
    let app = app(store, Arc::new(UnavailableCacheBackend));
    let request = Request::builder()
        .uri("/health/ready")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["status"], "degraded");
}
