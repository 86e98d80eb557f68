pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extract;
pub mod generator;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod source;
#[cfg(test)]
mod test_http;

pub use chunking::{reassemble, split_document, split_documents, ChunkingConfig};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, OllamaEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_OLLAMA_URL,
};
pub use error::{ErrorKind, RagError, Result};
pub use extract::{extract_json_array, FlashcardExtraction, MISSING_FIELD};
pub use generator::{ChatCompletionGenerator, Generator, DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL};
pub use index::{ScoredChunk, VectorIndex};
pub use models::{
    Chunk, Flashcard, IndexEntry, PipelineOptions, RawDocument, SimilarityMetric, DEFAULT_TIMEOUT,
    DEFAULT_TOP_K,
};
pub use pipeline::{AnsweringPipeline, FLASHCARD_REQUEST};
pub use prompt::{compose, Prompt, NOT_FOUND_ANSWER};
pub use source::{parse_corpus, DocumentSource, HttpJsonSource, JsonFileSource};
