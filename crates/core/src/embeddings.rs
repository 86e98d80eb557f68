use crate::error::RagError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use url::Url;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "gemma:2b";
pub const DEFAULT_EMBEDDING_BATCH: usize = 32;

/// Maps text into a vector space. Chunks and queries must go through the same
/// instance so their vectors stay comparable.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut vectors = self.embed_many(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::upstream("embedder", "no vector returned for query"))
    }
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Arc<T> {
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        (**self).embed_many(texts).await
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RagError> {
        (**self).embed_one(text).await
    }
}

/// Resolves `path` below `base_url`, keeping any path prefix the base carries.
pub(crate) fn join_endpoint(base_url: &str, path: &str) -> Result<Url, RagError> {
    let mut base = Url::parse(base_url.trim())?;
    if !base.path().ends_with('/') {
        let prefixed = format!("{}/", base.path());
        base.set_path(&prefixed);
    }
    Ok(base.join(path)?)
}

/// Hashing embedder over character trigrams. It needs no model or service, so
/// `--embedder ngram` can index and answer against a corpus fully offline, and
/// the pipeline tests get deterministic vectors from it.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn trigram_bucket(trigram: &[char], buckets: usize) -> usize {
    let mut utf8 = [0u8; 4];
    let mut hash = FNV_OFFSET;
    for ch in trigram {
        for byte in ch.encode_utf8(&mut utf8).bytes() {
            hash = (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME);
        }
    }
    (hash % buckets as u64) as usize
}

impl CharacterNgramEmbedder {
    /// Unit-length trigram histogram of the lowercased text. Texts shorter than
    /// three characters map to the zero vector.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let buckets = self.dimensions.max(1);
        let mut vector = vec![0f32; buckets];
        let chars: Vec<char> = text.to_lowercase().chars().collect();

        for trigram in chars.windows(3) {
            vector[trigram_bucket(trigram, buckets)] += 1.0;
        }

        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|value| *value /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

/// Embedder backed by an Ollama server's `/api/embed` endpoint.
pub struct OllamaEmbedder {
    client: Client,
    endpoint: Url,
    model: String,
    batch_size: usize,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, RagError> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(RagError::Configuration(
                "embedding model identifier is empty".to_string(),
            ));
        }

        let endpoint = join_endpoint(base_url, "api/embed")?;
        Ok(Self {
            client: Client::new(),
            endpoint,
            model,
            batch_size: DEFAULT_EMBEDDING_BATCH,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&OllamaEmbedRequest {
                model: &self.model,
                input: batch,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::upstream("ollama", format!("{status}: {body}")));
        }

        let parsed: OllamaEmbedResponse = response.json().await?;
        if parsed.embeddings.len() != batch.len() {
            return Err(RagError::upstream(
                "ollama",
                format!(
                    "embedding count {} doesn't match input count {}",
                    parsed.embeddings.len(),
                    batch.len()
                ),
            ));
        }

        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(model = %self.model, batch = batch.len(), "requesting embeddings");
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}
