//! Postgres-backed store tests. Require a reachable database configured
//! through `POLYGLOT_DB_*`; run with `--features db-tests`.

#![cfg(feature = "db-tests")]

use futures_util::TryStreamExt;
use polyglot_api::{DbConfig, PgStore};
use polyglot_core::{
    ExportShape, NewTranslation, PageRequest, PolyglotError, StorageError, TranslationFilter,
    TranslationPatch,
};
use polyglot_export::{ExportConfig, ExportEngine};
use polyglot_storage::{SharedStore, TranslationStore};
use polyglot_test_utils::assertions::parse_export;
use polyglot_test_utils::fixtures::{grouping_rows, seed};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

static DB_LOCK: Mutex<()> = Mutex::const_new(());

async fn fresh_store() -> (MutexGuard<'static, ()>, Arc<PgStore>) {
    let guard = DB_LOCK.lock().await;
    let store = PgStore::from_config(&DbConfig::from_env()).unwrap();
    store.migrate().await.unwrap();
    store.truncate().await.unwrap();
    (guard, Arc::new(store))
}

fn new_translation(key: &str, locale: &str, value: &str, tags: &[&str]) -> NewTranslation {
    NewTranslation {
        key: key.to_string(),
        locale: locale.to_string(),
        value: value.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

#[tokio::test]
async fn test_round_trip_with_tags() {
    let (_guard, store) = fresh_store().await;
    store.tag_create("web").await.unwrap();
    store.tag_create("mobile").await.unwrap();

    let created = store
        .translation_create(new_translation("home.title", "en", "Welcome", &["web", "mobile"]))
        .await
        .unwrap();
    let fetched = store
        .translation_get(created.translation.id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(fetched.translation.value, "Welcome");
    let names: Vec<_> = fetched.tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["mobile", "web"]);
}

#[tokio::test]
async fn test_duplicate_key_locale_conflicts() {
    let (_guard, store) = fresh_store().await;
    store
        .translation_create(new_translation("a", "en", "1", &[]))
        .await
        .unwrap();
    let err = store
        .translation_create(new_translation("a", "en", "2", &[]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PolyglotError::Storage(StorageError::Conflict { .. })
    ));
}

#[tokio::test]
async fn test_update_resyncs_tags() {
    let (_guard, store) = fresh_store().await;
    store.tag_create("web").await.unwrap();
    store.tag_create("mobile").await.unwrap();
    let created = store
        .translation_create(new_translation("a", "en", "1", &["web"]))
        .await
        .unwrap();

    let updated = store
        .translation_update(
            created.translation.id,
            TranslationPatch {
                tags: Some(vec!["mobile".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    let names: Vec<_> = updated.tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["mobile"]);
    assert_eq!(updated.translation.value, "1");
}

#[tokio::test]
async fn test_tag_delete_cascades_links() {
    let (_guard, store) = fresh_store().await;
    let tag = store.tag_create("only").await.unwrap();
    let created = store
        .translation_create(new_translation("a", "en", "1", &["only"]))
        .await
        .unwrap();

    assert!(store.tag_delete(tag.id).await.unwrap());
    let fetched = store
        .translation_get(created.translation.id)
        .await
        .unwrap()
        .unwrap();
    assert!(fetched.tags.is_empty());
}

#[tokio::test]
async fn test_list_filters_by_any_tag() {
    let (_guard, store) = fresh_store().await;
    seed(store.as_ref(), &grouping_rows()).await;

    let filter = TranslationFilter {
        tags: vec!["web".to_string()],
        ..Default::default()
    };
    let page = store
        .translation_list(&filter, PageRequest::new(None, None, 100))
        .await
        .unwrap();
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn test_export_groups_across_small_chunks() {
    let (_guard, store) = fresh_store().await;
    seed(store.as_ref(), &grouping_rows()).await;

    let shared: SharedStore = store.clone();
    let engine = ExportEngine::new(shared, ExportConfig::default().with_chunk_size(1));
    let chunks: Vec<_> = engine
        .stream(&ExportShape::All)
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    let body: Vec<u8> = chunks.iter().flat_map(|b| b.iter().copied()).collect();

    assert_eq!(
        parse_export(&body),
        json!({"en": {"a": "1", "b": "2"}, "fr": {"a": "3"}})
    );
}

#[tokio::test]
async fn test_bulk_insert_skips_existing_rows() {
    let (_guard, store) = fresh_store().await;
    store.tag_create("web").await.unwrap();
    let rows = vec![
        ("en".to_string(), "a".to_string(), "1".to_string()),
        ("fr".to_string(), "a".to_string(), "3".to_string()),
    ];
    assert_eq!(store.bulk_insert_translations(&rows).await.unwrap(), 2);
    assert_eq!(store.bulk_insert_translations(&rows).await.unwrap(), 0);

    let links = vec![("en".to_string(), "a".to_string(), "web".to_string())];
    assert_eq!(store.bulk_link_tags(&links).await.unwrap(), 1);
    assert_eq!(store.locales_distinct().await.unwrap(), vec!["en", "fr"]);
}
