use crate::{
    engine::Engine,
    postprocess::normalize_page_text,
    splitter::RecursiveSplitter,
    store::{Document, VectorStore},
    util::hash_file,
};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct IndexOutcome {
    pub collection: String,
    pub chunk_count: usize,
    pub skipped: bool,
}

/// Loads the marking scheme into the vector store once.
pub struct Indexer<'a> {
    engine: &'a dyn Engine,
    splitter: &'a RecursiveSplitter,
}

impl<'a> Indexer<'a> {
    pub fn new(engine: &'a dyn Engine, splitter: &'a RecursiveSplitter) -> Self {
        Self { engine, splitter }
    }

    /// Index `document` unless the collection already holds entries.
    ///
    /// A populated collection is never refreshed, even if the document
    /// changed since it was indexed.
    pub fn index(&self, store: &mut VectorStore, document: &Path) -> Result<IndexOutcome> {
        let digest = hash_file(document)
            .with_context(|| format!("reading marking scheme: {}", document.display()))?;

        if store.count() > 0 {
            if let Some(manifest) = store.manifest() {
                if manifest.source_sha256.as_deref().is_some_and(|d| d != digest) {
                    warn!(
                        "marking scheme {} changed since collection '{}' was built; using the existing index",
                        document.display(),
                        store.collection()
                    );
                }
                if manifest.embedding_model != store.embedding_model() {
                    warn!(
                        "collection '{}' was embedded with {} but the current embedder is {}",
                        store.collection(),
                        manifest.embedding_model,
                        store.embedding_model()
                    );
                }
            }
            info!(
                "collection '{}' already holds {} chunks; skipping indexing",
                store.collection(),
                store.count()
            );
            return Ok(IndexOutcome {
                collection: store.collection().to_string(),
                chunk_count: store.count(),
                skipped: true,
            });
        }

        let pages = self
            .engine
            .extract_text(document)
            .with_context(|| format!("extracting marking scheme text: {}", document.display()))?;

        let source = document.display().to_string();
        let docs: Vec<Document> = pages
            .iter()
            .enumerate()
            .map(|(page, raw)| {
                Document::new(normalize_page_text(raw))
                    .with_metadata("source", json!(source))
                    .with_metadata("page", json!(page))
            })
            .collect();

        let splits = self.splitter.split_documents(&docs);
        info!(
            "indexing {} pages as {} chunks into '{}'",
            docs.len(),
            splits.len(),
            store.collection()
        );
        store.add_documents(splits, Some(digest))?;

        Ok(IndexOutcome {
            collection: store.collection().to_string(),
            chunk_count: store.count(),
            skipped: false,
        })
    }
}
