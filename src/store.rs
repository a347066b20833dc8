use crate::embedding::Embedder;
use crate::util::{ensure_dir, now, rfc3339, sha256_hex};
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A piece of text plus free-form metadata (source path, page, offset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub collection: String,
    pub embedding_model: String,
    #[serde(default)]
    pub source_sha256: Option<String>,
    pub created: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    id: String,
    text: String,
    metadata: Map<String, Value>,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CollectionFile {
    manifest: Manifest,
    records: Vec<Record>,
}

/// A persisted collection of embedded documents, one JSON file per
/// collection under the store directory. Search is an exhaustive cosine scan.
///
/// There is no locking: two processes writing the same collection race.
pub struct VectorStore {
    path: PathBuf,
    collection: String,
    embedder: Box<dyn Embedder>,
    batch_size: usize,
    manifest: Option<Manifest>,
    records: Vec<Record>,
}

impl VectorStore {
    pub fn open(dir: &Path, collection: &str, embedder: Box<dyn Embedder>) -> Result<Self> {
        if collection.is_empty()
            || !collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            bail!("invalid collection name: {:?}", collection);
        }
        ensure_dir(dir)?;
        let path = dir.join(format!("{}.json", collection));

        let (manifest, records) = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading vector store: {}", path.display()))?;
            let file: CollectionFile = serde_json::from_str(&raw)
                .with_context(|| format!("parsing vector store: {}", path.display()))?;
            (Some(file.manifest), file.records)
        } else {
            (None, Vec::new())
        };

        debug!(
            "vector store {} opened with {} records",
            path.display(),
            records.len()
        );

        Ok(Self {
            path,
            collection: collection.to_string(),
            embedder,
            batch_size: 64,
            manifest,
            records,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    pub fn embedding_model(&self) -> &str {
        self.embedder.model()
    }

    /// Embed and store `docs`, then persist the whole collection.
    ///
    /// Nothing is written unless every batch embeds successfully.
    pub fn add_documents(
        &mut self,
        docs: Vec<Document>,
        source_sha256: Option<String>,
    ) -> Result<Vec<String>> {
        let mut pending = Vec::with_capacity(docs.len());
        for batch in docs.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
            let vectors = self.embedder.embed(&texts)?;
            if vectors.len() != batch.len() {
                return Err(anyhow!(
                    "embedder returned {} vectors for {} documents",
                    vectors.len(),
                    batch.len()
                ));
            }
            for (doc, embedding) in batch.iter().zip(vectors) {
                let position = self.records.len() + pending.len();
                let id = sha256_hex(
                    format!("{}:{}:{}", self.collection, position, doc.text).as_bytes(),
                );
                pending.push(Record {
                    id,
                    text: doc.text.clone(),
                    metadata: doc.metadata.clone(),
                    embedding,
                });
            }
        }

        let ids = pending.iter().map(|r| r.id.clone()).collect();
        self.records.extend(pending);
        let manifest = self.manifest.get_or_insert_with(|| Manifest {
            collection: self.collection.clone(),
            embedding_model: self.embedder.model().to_string(),
            source_sha256: None,
            created: rfc3339(now()),
        });
        if source_sha256.is_some() {
            manifest.source_sha256 = source_sha256;
        }
        self.persist()?;
        Ok(ids)
    }

    /// The `k` stored documents closest to `query`, best first.
    pub fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        if self.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self
            .embedder
            .embed(&[query.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("embedder returned no vector for query"))?;

        let mut scored: Vec<(f32, &Record)> = self
            .records
            .iter()
            .map(|r| (cosine(&query_vec, &r.embedding), r))
            .collect();
        // stable: equal scores keep insertion order
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, r)| Document {
                text: r.text.clone(),
                metadata: r.metadata.clone(),
            })
            .collect())
    }

    fn persist(&self) -> Result<()> {
        let manifest = self
            .manifest
            .clone()
            .ok_or_else(|| anyhow!("cannot persist a collection without a manifest"))?;
        let file = CollectionFile {
            manifest,
            records: self.records.clone(),
        };
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(&file)?)
            .with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::NEG_INFINITY;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::NgramEmbedder;
    use serde_json::json;

    fn store(dir: &Path) -> VectorStore {
        VectorStore::open(dir, "unit", Box::new(NgramEmbedder::new(128).unwrap())).unwrap()
    }

    #[test]
    fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = store(dir.path());
        assert_eq!(s.count(), 0);
        let ids = s
            .add_documents(
                vec![
                    Document::new("Q1 answer: Newton's second law").with_metadata("page", json!(0)),
                    Document::new("Q2 answer: conservation of energy").with_metadata("page", json!(1)),
                ],
                Some("abc".into()),
            )
            .unwrap();
        assert_eq!(ids.len(), 2);

        let reopened = store(dir.path());
        assert_eq!(reopened.count(), 2);
        let manifest = reopened.manifest().unwrap();
        assert_eq!(manifest.source_sha256.as_deref(), Some("abc"));
        assert_eq!(manifest.embedding_model, "char-trigram-128");
    }

    #[test]
    fn nearest_document_ranks_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = store(dir.path());
        s.add_documents(
            vec![
                Document::new("thermodynamics entropy heat engine"),
                Document::new("projectile motion range of a projectile"),
                Document::new("optics lens focal length"),
            ],
            None,
        )
        .unwrap();

        let hits = s.similarity_search("range of projectile motion", 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].text.contains("projectile"));
    }

    #[test]
    fn rejects_path_like_collection_names() {
        let dir = tempfile::tempdir().unwrap();
        let e = Box::new(NgramEmbedder::new(8).unwrap());
        assert!(VectorStore::open(dir.path(), "../escape", e).is_err());
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine(&[1.0], &[1.0, 0.0]), f32::NEG_INFINITY);
        assert!((cosine(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
