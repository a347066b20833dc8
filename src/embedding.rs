use crate::config;
use crate::provider::ProviderConfig;
use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;

/// Maps texts to fixed-length vectors for similarity search.
pub trait Embedder {
    /// Identifies the embedding space; vectors from different models are not comparable.
    fn model(&self) -> &str;
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Build the embedder named by `index.embedder`.
pub fn from_config(cfg: &config::Config) -> Result<Box<dyn Embedder>> {
    match cfg.index.embedder.as_str() {
        "http" => {
            let provider = ProviderConfig::from_model(&cfg.model)?;
            Ok(Box::new(HttpEmbedder::new(
                &provider.base_url,
                provider.api_key,
                &cfg.index.embedding_model,
            )?))
        }
        "ngram" => Ok(Box::new(NgramEmbedder::new(cfg.index.ngram_dimensions)?)),
        other => Err(anyhow!("unknown index.embedder: {other}")),
    }
}

/// OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(base_url: &str, api_key: String, model: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .with_context(|| "building HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }
}

impl Embedder for HttpEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .with_context(|| format!("POST {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(anyhow!("embedding request failed: {}\n{}", status, body));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .with_context(|| "decoding embedding response")?;
        if parsed.data.len() != texts.len() {
            return Err(anyhow!(
                "embedding response has {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            ));
        }
        parsed.data.sort_by_key(|row| row.index);
        Ok(parsed.data.into_iter().map(|row| row.embedding).collect())
    }
}

/// Offline embedder: hashed character trigrams, L2-normalized.
///
/// Only lexical overlap is captured, which is enough to find the marking
/// scheme entry for a question number or keyword.
pub struct NgramEmbedder {
    dimensions: usize,
    name: String,
}

impl NgramEmbedder {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(anyhow!("index.ngram_dimensions must be positive"));
        }
        Ok(Self {
            dimensions,
            name: format!("char-trigram-{}", dimensions),
        })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dimensions];
        let chars: Vec<char> = std::iter::once(' ')
            .chain(text.to_lowercase().chars())
            .chain(std::iter::once(' '))
            .collect();
        for gram in chars.windows(3) {
            let bucket = (fnv1a(gram) % self.dimensions as u64) as usize;
            v[bucket] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

impl Embedder for NgramEmbedder {
    fn model(&self) -> &str {
        &self.name
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for ch in chars {
        let mut buf = [0u8; 4];
        for b in ch.encode_utf8(&mut buf).bytes() {
            hash ^= b as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
    }
    hash
}
