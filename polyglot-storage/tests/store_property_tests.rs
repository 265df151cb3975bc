//! Property-Based Tests for the In-Memory Record Store
//!
//! **Property: Keyset Scan Completeness**
//!
//! For any set of translations and any chunk size, walking `export_chunk`
//! from the start until it returns an empty chunk SHALL visit every matching
//! row exactly once, in ascending `(locale, key)` order.

use std::collections::BTreeMap;

use polyglot_core::{ExportCursor, ExportRow, ExportScan, NewTranslation};
use polyglot_storage::{InMemoryStore, TranslationStore};
use proptest::prelude::*;
use tokio::runtime::Runtime;

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn arb_rows() -> impl Strategy<Value = BTreeMap<(String, String), String>> {
    prop::collection::btree_map(
        ("(en|fr|de|pt_BR)", "[a-z]{1,3}(\\.[a-z]{1,3})?"),
        "\\PC{0,12}",
        0..40,
    )
}

async fn walk(store: &InMemoryStore, scan: &ExportScan, chunk: usize) -> Vec<ExportRow> {
    let mut out = Vec::new();
    let mut cursor: Option<ExportCursor> = None;
    loop {
        let rows = store
            .export_chunk(scan, cursor.as_ref(), chunk)
            .await
            .expect("chunk read");
        if rows.is_empty() {
            break;
        }
        assert!(rows.len() <= chunk);
        cursor = rows.last().map(ExportRow::cursor);
        out.extend(rows);
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_chunked_scan_visits_every_row_in_order(rows in arb_rows(), chunk in 1usize..7) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let store = InMemoryStore::new();
            for ((locale, key), value) in &rows {
                store
                    .translation_create(NewTranslation {
                        key: key.clone(),
                        locale: locale.clone(),
                        value: value.clone(),
                        tags: vec![],
                    })
                    .await
                    .expect("insert");
            }

            let visited = walk(&store, &ExportScan::default(), chunk).await;
            let expected: Vec<ExportRow> = rows
                .iter()
                .map(|((l, k), v)| ExportRow::new(l, k, v))
                .collect();
            prop_assert_eq!(visited, expected);

            let fr = ExportScan { locale: Some("fr".to_string()), tags: vec![] };
            let visited_fr = walk(&store, &fr, chunk).await;
            prop_assert!(visited_fr.iter().all(|r| r.locale == "fr"));
            prop_assert_eq!(
                visited_fr.len(),
                rows.keys().filter(|(l, _)| l == "fr").count()
            );
            Ok(())
        })?;
    }
}
