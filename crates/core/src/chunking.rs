use crate::error::RagError;
use crate::models::{Chunk, RawDocument};

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Window length and overlap, both counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn new(size: usize, overlap: usize) -> Result<Self, RagError> {
        let config = Self { size, overlap };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RagError> {
        if self.size == 0 {
            return Err(RagError::InvalidChunkConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.size {
            return Err(RagError::InvalidChunkConfig(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                self.overlap, self.size
            )));
        }
        Ok(())
    }

    fn step(&self) -> usize {
        self.size - self.overlap
    }
}

/// Splits every document independently; chunks are returned in document order,
/// then window order.
pub fn split_documents(
    documents: &[RawDocument],
    config: ChunkingConfig,
) -> Result<Vec<Chunk>, RagError> {
    config.validate()?;

    let mut chunks = Vec::new();
    for document in documents {
        chunks.extend(split_document(document, config)?);
    }
    Ok(chunks)
}

pub fn split_document(document: &RawDocument, config: ChunkingConfig) -> Result<Vec<Chunk>, RagError> {
    config.validate()?;

    let chars: Vec<char> = document.text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + config.size).min(chars.len());
        chunks.push(Chunk {
            document: document.ordinal,
            chunk_index: chunks.len(),
            start,
            end,
            text: chars[start..end].iter().collect(),
        });
        if end == chars.len() {
            break;
        }
        start = start.saturating_add(config.step());
    }

    Ok(chunks)
}

/// Rebuilds the source text of one document from its chunks by dropping the
/// characters each chunk shares with its predecessor.
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut text = String::new();
    let mut covered = 0usize;

    for chunk in chunks {
        let skip = covered.saturating_sub(chunk.start);
        text.extend(chunk.text.chars().skip(skip));
        covered = covered.max(chunk.end);
    }

    text
}
