//! Embedding providers.
//!
//! The embedding model is a black box: `embed_batch` maps texts to unit
//! vectors of a fixed dimension. Providers: an OpenAI-compatible HTTP
//! endpoint, Ollama, and a deterministic offline mock used throughout the
//! test suite.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::{Config, EmbedderKind};
use crate::error::Error;
use crate::vector::l2_normalize;

/// Concurrent in-flight batches during bulk embedding.
const MAX_CONCURRENT_BATCHES: usize = 4;

const OPENAI_DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
const OLLAMA_DEFAULT_HOST: &str = "http://localhost:11434";

/// Trait for embedding text into unit-normalized vector representations.
#[async_trait]
pub trait Embedder: Send + Sync + std::fmt::Debug {
    /// Embed a batch of texts, returning one unit vector per input.
    async fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>>;

    /// The dimensionality of the vectors produced.
    fn dimensions(&self) -> usize;

    /// Human-readable name for this provider.
    fn name(&self) -> &str;
}

/// Create an embedder from the store configuration.
pub fn create_embedder(config: &Config) -> crate::Result<Box<dyn Embedder>> {
    let settings = &config.embedding;
    match settings.provider {
        EmbedderKind::OpenAI => {
            let api_key = settings
                .api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .ok_or_else(|| {
                    Error::Embedding(
                        "openai provider requires embedding.api_key or OPENAI_API_KEY".into(),
                    )
                })?;
            Ok(Box::new(HttpEmbedder::new(
                settings
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| OPENAI_DEFAULT_ENDPOINT.to_string()),
                api_key,
                settings.model.clone(),
                settings.dimensions,
            )?))
        }
        EmbedderKind::Ollama => Ok(Box::new(OllamaEmbedder::new(
            settings
                .endpoint
                .clone()
                .unwrap_or_else(|| OLLAMA_DEFAULT_HOST.to_string()),
            settings.model.clone(),
            settings.dimensions,
        )?)),
        EmbedderKind::Mock => Ok(Box::new(MockEmbedder::new(settings.dimensions))),
    }
}

/// Embed many texts in order, batching requests and running up to
/// [`MAX_CONCURRENT_BATCHES`] batches concurrently. Output order matches
/// input order.
pub async fn embed_texts(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> crate::Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let batches: Vec<Vec<String>> = texts.chunks(batch_size).map(|b| b.to_vec()).collect();
    let total_batches = batches.len();
    debug!(texts = texts.len(), batches = total_batches, "embedding texts");

    let mut stream = stream::iter(batches.into_iter().map(|batch| async move {
        embedder.embed_batch(&batch).await
    }))
    .buffered(MAX_CONCURRENT_BATCHES);

    let mut vectors = Vec::with_capacity(texts.len());
    while let Some(batch_result) = stream.next().await {
        vectors.extend(batch_result?);
    }

    if vectors.len() != texts.len() {
        return Err(Error::Embedding(format!(
            "provider returned {} vectors for {} texts",
            vectors.len(),
            texts.len()
        )));
    }
    Ok(vectors)
}

/// OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug)]
pub struct HttpEmbedder {
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
    http: reqwest::Client,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: String,
        api_key: String,
        model: String,
        dimensions: usize,
    ) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Embedding(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            model,
            dimensions,
            http,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        let response = self
            .http
            .post(format!("{}/embeddings", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let head: String = body.chars().take(200).collect();
            return Err(Error::Embedding(format!("endpoint returned {status}: {head}")));
        }

        let data: serde_json::Value =
            response.json().await.map_err(|e| Error::Embedding(e.to_string()))?;
        let items = data["data"]
            .as_array()
            .ok_or_else(|| Error::Embedding("response missing 'data' array".into()))?;

        let mut vectors = Vec::with_capacity(items.len());
        for item in items {
            let raw = item["embedding"]
                .as_array()
                .ok_or_else(|| Error::Embedding("item missing 'embedding'".into()))?;
            let mut vector: Vec<f32> = raw
                .iter()
                .filter_map(|v| v.as_f64())
                .map(|v| v as f32)
                .collect();
            if vector.len() != self.dimensions {
                return Err(Error::Embedding(format!(
                    "expected {} dimensions, got {}",
                    self.dimensions,
                    vector.len()
                )));
            }
            l2_normalize(&mut vector);
            vectors.push(vector);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Ollama `/api/embed` endpoint.
#[derive(Debug)]
pub struct OllamaEmbedder {
    host: String,
    model: String,
    dimensions: usize,
    http: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(host: String, model: String, dimensions: usize) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Embedding(e.to_string()))?;
        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            model,
            dimensions,
            http,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        let response = self
            .http
            .post(format!("{}/api/embed", self.host))
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let head: String = body.chars().take(200).collect();
            return Err(Error::Embedding(format!("ollama returned {status}: {head}")));
        }

        let data: serde_json::Value =
            response.json().await.map_err(|e| Error::Embedding(e.to_string()))?;
        let items = data["embeddings"]
            .as_array()
            .ok_or_else(|| Error::Embedding("response missing 'embeddings'".into()))?;

        let mut vectors = Vec::with_capacity(items.len());
        for item in items {
            let raw = item
                .as_array()
                .ok_or_else(|| Error::Embedding("embedding is not an array".into()))?;
            let mut vector: Vec<f32> = raw
                .iter()
                .filter_map(|v| v.as_f64())
                .map(|v| v as f32)
                .collect();
            if vector.len() != self.dimensions {
                return Err(Error::Embedding(format!(
                    "expected {} dimensions, got {}",
                    self.dimensions,
                    vector.len()
                )));
            }
            l2_normalize(&mut vector);
            vectors.push(vector);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Deterministic offline embedder: a hashed bag-of-words model.
///
/// Each lowercase alphanumeric token is hashed into a bucket and counted,
/// then the vector is L2-normalized. Texts sharing vocabulary therefore
/// get proportionally higher cosine similarity, which makes ranking
/// behavior testable without a real model. Tracks how many batches it has
/// embedded.
#[derive(Debug)]
pub struct MockEmbedder {
    dimensions: usize,
    call_count: std::sync::atomic::AtomicUsize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            call_count: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of `embed_batch` calls made so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut value = [0u8; 8];
        value.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(value) % self.dimensions as u64) as usize
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            vector[self.bucket(token)] += 1.0;
        }
        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        self.call_count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock"
    }
}
