use crate::chunking::ChunkingConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TOP_K: usize = 4;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A document as delivered by the corpus source. `ordinal` is its position in
/// ingestion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub ordinal: usize,
    pub text: String,
}

impl RawDocument {
    pub fn new(ordinal: usize, text: impl Into<String>) -> Self {
        Self {
            ordinal,
            text: text.into(),
        }
    }

    pub fn from_texts<I, S>(texts: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        texts
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| Self::new(ordinal, text))
            .collect()
    }
}

/// A window of a source document. `start` and `end` are character offsets into
/// the original text, end exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub document: usize,
    pub chunk_index: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub text: String,
}

impl IndexEntry {
    pub fn new(vector: Vec<f32>, text: impl Into<String>) -> Self {
        Self {
            vector,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    #[default]
    Cosine,
    L2,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub chunking: ChunkingConfig,
    pub top_k: usize,
    pub metric: SimilarityMetric,
    pub timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            top_k: DEFAULT_TOP_K,
            metric: SimilarityMetric::Cosine,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl PipelineOptions {
    pub fn validate(&self) -> crate::Result<()> {
        self.chunking.validate()?;
        if self.top_k == 0 {
            return Err(crate::RagError::Configuration(
                "retrieval top_k must be at least 1".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(crate::RagError::Configuration(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
