//! Chunked streaming export.
//!
//! The engine walks the record store with keyset pagination on
//! `(locale, key)` and feeds each chunk through an [`ExportWriter`]. One
//! `Bytes` frame is yielded per chunk, so memory stays bounded by the chunk
//! size no matter how many rows the export covers.
//!
//! The stream is lazy: nothing is read until it is polled, and dropping it
//! (for example on client disconnect) stops the scan before the next chunk.

use std::pin::Pin;
use std::time::Instant;

use async_stream::try_stream;
use bytes::Bytes;
use futures_util::Stream;
use polyglot_core::{ExportCursor, ExportRow, ExportShape};
use polyglot_storage::SharedStore;
use tracing::debug;

use crate::error::ExportError;
use crate::writer::{ExportWriter, Layout};

/// Default rows per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// A boxed stream of JSON body frames.
pub type ExportStream = Pin<Box<dyn Stream<Item = Result<Bytes, ExportError>> + Send + 'static>>;

#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Rows fetched per store round trip.
    pub chunk_size: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ExportConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

#[derive(Clone)]
pub struct ExportEngine {
    store: SharedStore,
    config: ExportConfig,
}

impl ExportEngine {
    pub fn new(store: SharedStore, config: ExportConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Stream the JSON body for a row export shape.
    pub fn stream(&self, shape: &ExportShape) -> Result<ExportStream, ExportError> {
        let scan = shape
            .scan()
            .ok_or(ExportError::UnsupportedShape(shape.kind()))?;
        let layout = if shape.is_grouped() {
            Layout::Grouped
        } else {
            Layout::Flat
        };
        let store = self.store.clone();
        let chunk_size = self.config.chunk_size;
        let kind = shape.kind();

        let stream = try_stream! {
            let started = Instant::now();
            let mut writer = ExportWriter::new(layout);
            writer.begin()?;
            let mut cursor: Option<ExportCursor> = None;
            let mut rows_total = 0usize;
            let mut chunks = 0usize;

            loop {
                let rows = store
                    .export_chunk(&scan, cursor.as_ref(), chunk_size)
                    .await
                    .map_err(ExportError::from)?;
                if rows.is_empty() {
                    break;
                }
                for row in &rows {
                    writer.push(row)?;
                }
                rows_total += rows.len();
                chunks += 1;
                let exhausted = rows.len() < chunk_size;
                cursor = rows.last().map(ExportRow::cursor);
                yield writer.take();
                if exhausted {
                    break;
                }
            }

            writer.finish()?;
            yield writer.take();

            debug!(
                shape = kind,
                rows = rows_total,
                chunks,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "export stream completed"
            );
        };
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use polyglot_core::NewTranslation;
    use polyglot_storage::{InMemoryStore, TranslationStore};
    use std::sync::Arc;

    async fn store_with(rows: &[(&str, &str, &str)]) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for (locale, key, value) in rows {
            store
                .translation_create(NewTranslation {
                    key: key.to_string(),
                    locale: locale.to_string(),
                    value: value.to_string(),
                    tags: vec![],
                })
                .await
                .unwrap();
        }
        store
    }

    async fn collect(mut stream: ExportStream) -> (Vec<Bytes>, String) {
        let mut frames = Vec::new();
        while let Some(frame) = stream.next().await {
            frames.push(frame.unwrap());
        }
        let body = frames.iter().flat_map(|b| b.to_vec()).collect::<Vec<u8>>();
        (frames, String::from_utf8(body).unwrap())
    }

    #[tokio::test]
    async fn test_grouping_across_chunk_boundaries() {
        let store = store_with(&[("fr", "a", "3"), ("en", "b", "2"), ("en", "a", "1")]).await;
        for chunk_size in 1..=4 {
            let engine = ExportEngine::new(
                store.clone(),
                ExportConfig::default().with_chunk_size(chunk_size),
            );
            let (_, body) = collect(engine.stream(&ExportShape::All).unwrap()).await;
            assert_eq!(body, r#"{"en":{"a":"1","b":"2"},"fr":{"a":"3"}}"#);
        }
    }

    #[tokio::test]
    async fn test_one_frame_per_chunk() {
        let store = store_with(&[("en", "a", "1"), ("en", "b", "2"), ("en", "c", "3")]).await;
        let engine = ExportEngine::new(store, ExportConfig::default().with_chunk_size(2));
        let (frames, body) = collect(engine.stream(&ExportShape::locale("en")).unwrap()).await;
        // Two full-or-partial chunks plus the closing frame.
        assert_eq!(frames.len(), 3);
        assert_eq!(body, r#"{"a":"1","b":"2","c":"3"}"#);
    }

    #[tokio::test]
    async fn test_empty_export_is_empty_object() {
        let store = store_with(&[]).await;
        let engine = ExportEngine::new(store, ExportConfig::default());
        let (_, body) = collect(engine.stream(&ExportShape::All).unwrap()).await;
        assert_eq!(body, "{}");
        let (_, body) = collect(engine.stream(&ExportShape::locale("xx")).unwrap()).await;
        assert_eq!(body, "{}");
    }

    #[tokio::test]
    async fn test_locales_shape_is_not_streamable() {
        let engine = ExportEngine::new(store_with(&[]).await, ExportConfig::default());
        assert!(matches!(
            engine.stream(&ExportShape::Locales),
            Err(ExportError::UnsupportedShape("locales"))
        ));
    }
}
