use crate::chunking::split_documents;
use crate::embeddings::Embedder;
use crate::error::RagError;
use crate::extract::{extract_json_array, FlashcardExtraction};
use crate::generator::Generator;
use crate::index::VectorIndex;
use crate::models::{IndexEntry, PipelineOptions, RawDocument};
use crate::prompt::{compose, Prompt};
use crate::source::DocumentSource;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const FLASHCARD_REQUEST: &str =
    "Generate 10 flashcards as JSON array with 'question' and 'answer'.";

/// Grounded question answering over a corpus indexed once at build time.
/// The index is never touched after `build`, so `&self` methods may run
/// concurrently from any number of callers.
pub struct AnsweringPipeline<E, G>
where
    E: Embedder,
    G: Generator,
{
    embedder: E,
    generator: G,
    index: VectorIndex,
    options: PipelineOptions,
}

impl<E, G> AnsweringPipeline<E, G>
where
    E: Embedder,
    G: Generator,
{
    pub async fn build(
        documents: Vec<RawDocument>,
        embedder: E,
        generator: G,
        options: PipelineOptions,
    ) -> Result<Self, RagError> {
        options.validate()?;
        let started = Instant::now();

        let chunks = split_documents(&documents, options.chunking)?;
        drop(documents);

        let texts: Vec<String> = chunks.into_iter().map(|chunk| chunk.text).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed_many(&texts).await?
        };

        if vectors.len() != texts.len() {
            return Err(RagError::upstream(
                "embedder",
                format!(
                    "embedding count {} doesn't match chunk count {}",
                    vectors.len(),
                    texts.len()
                ),
            ));
        }

        let entries = vectors
            .into_iter()
            .zip(texts)
            .map(|(vector, text)| IndexEntry::new(vector, text))
            .collect();
        let index = VectorIndex::build(entries, options.metric)?;

        info!(
            chunks = index.len(),
            dimensions = index.dimensions(),
            metric = ?index.metric(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "vector index built"
        );
        if index.is_empty() {
            warn!("corpus produced no chunks; every question will be answered without context");
        }

        Ok(Self {
            embedder,
            generator,
            index,
            options,
        })
    }

    /// Fetches the corpus from `source`, then builds as [`AnsweringPipeline::build`].
    pub async fn from_source<S>(
        source: &S,
        embedder: E,
        generator: G,
        options: PipelineOptions,
    ) -> Result<Self, RagError>
    where
        S: DocumentSource + ?Sized,
    {
        options.validate()?;
        let documents = source.fetch_corpus().await?;
        Self::build(documents, embedder, generator, options).await
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Chunk texts most similar to `question`, best first.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<&str>, RagError> {
        let query_vector = self.embedder.embed_one(question).await?;
        self.index.query(&query_vector, self.options.top_k)
    }

    pub async fn compose_prompt(&self, question: &str) -> Result<Prompt, RagError> {
        let context = self.retrieve(question).await?;
        debug!(retrieved = context.len(), "composing prompt");
        Ok(compose(question, &context))
    }

    /// Answers from the indexed corpus. The generator output is returned as is,
    /// including the not-found reply.
    pub async fn ask(&self, question: &str) -> Result<String, RagError> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidQuestion("question is empty".to_string()));
        }

        let prompt = self.compose_prompt(question).await?;
        self.generator.generate(prompt.as_str()).await
    }

    /// [`AnsweringPipeline::ask`] bounded by `limit`. On expiry the pending
    /// backend requests are dropped locally, but a backend that already
    /// received one may keep working on it.
    pub async fn ask_within(&self, question: &str, limit: Duration) -> Result<String, RagError> {
        within(limit, self.ask(question)).await
    }

    /// `ask_within` using the configured default timeout.
    pub async fn ask_timed(&self, question: &str) -> Result<String, RagError> {
        self.ask_within(question, self.options.timeout).await
    }

    pub async fn flashcards(&self) -> Result<FlashcardExtraction, RagError> {
        let raw = self.ask(FLASHCARD_REQUEST).await?;
        let extraction = extract_json_array(&raw)?;
        if !extraction.is_complete() {
            warn!(
                cards = extraction.cards().len(),
                substituted = extraction.substituted(),
                "flashcards had missing fields"
            );
        }
        Ok(extraction)
    }

    pub async fn flashcards_within(&self, limit: Duration) -> Result<FlashcardExtraction, RagError> {
        within(limit, self.flashcards()).await
    }
}

async fn within<T, F>(limit: Duration, work: F) -> Result<T, RagError>
where
    F: Future<Output = Result<T, RagError>>,
{
    match tokio::time::timeout(limit, work).await {
        Ok(result) => result,
        Err(_) => Err(RagError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::prompt::NOT_FOUND_ANSWER;
    use crate::ErrorKind;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Records every prompt. With a `needle`, only questions mentioning it get
    /// the canned reply; the rest get the not-found reply.
    struct RecordingGenerator {
        reply: String,
        needle: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingGenerator {
        fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                needle: None,
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn grounded(reply: &str, needle: &str) -> Self {
            Self {
                needle: Some(needle.to_string()),
                ..Self::replying(reply)
            }
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, RagError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let question = prompt.rsplit("Question: ").next().unwrap_or_default();
            match &self.needle {
                Some(needle) if !question.contains(needle.as_str()) => {
                    Ok(NOT_FOUND_ANSWER.to_string())
                }
                _ => Ok(self.reply.clone()),
            }
        }
    }

    struct SlowGenerator(Duration);

    #[async_trait]
    impl Generator for SlowGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, RagError> {
            tokio::time::sleep(self.0).await;
            Ok("too late".to_string())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, RagError> {
            Err(RagError::upstream("generator", "503 Service Unavailable: over capacity"))
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed_many(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            Err(RagError::upstream("ollama", "connection refused"))
        }
    }

    fn france() -> Vec<RawDocument> {
        RawDocument::from_texts(["Paris is the capital of France."])
    }

    #[tokio::test]
    async fn answer_is_returned_verbatim_with_grounded_prompt() {
        let generator = Arc::new(RecordingGenerator::replying("Paris"));
        let pipeline = AnsweringPipeline::build(
            france(),
            CharacterNgramEmbedder::default(),
            generator.clone(),
            PipelineOptions::default(),
        )
        .await
        .unwrap();

        let answer = pipeline.ask("What is the capital of France?").await.unwrap();
        assert_eq!(answer, "Paris");

        let prompt = generator.last_prompt();
        assert!(prompt.contains("<context>\nParis is the capital of France.\n</context>"));
        assert!(prompt.contains("Question: What is the capital of France?"));
    }

    #[tokio::test]
    async fn unknown_answer_is_surfaced_from_the_model() {
        let generator = Arc::new(RecordingGenerator::grounded("Paris", "France"));
        let pipeline = AnsweringPipeline::build(
            france(),
            CharacterNgramEmbedder::default(),
            generator.clone(),
            PipelineOptions::default(),
        )
        .await
        .unwrap();

        let prompt = pipeline
            .compose_prompt("What is the capital of Mars?")
            .await
            .unwrap();
        assert_eq!(prompt.context(), "Paris is the capital of France.");

        let answer = pipeline.ask("What is the capital of Mars?").await.unwrap();
        assert_eq!(answer, NOT_FOUND_ANSWER);
    }

    #[tokio::test]
    async fn empty_corpus_still_answers() {
        let generator = Arc::new(RecordingGenerator::replying(NOT_FOUND_ANSWER));
        let pipeline = AnsweringPipeline::build(
            Vec::new(),
            CharacterNgramEmbedder::default(),
            generator.clone(),
            PipelineOptions::default(),
        )
        .await
        .unwrap();

        assert!(pipeline.index().is_empty());
        assert!(pipeline.retrieve("anything").await.unwrap().is_empty());
        assert_eq!(pipeline.ask("anything").await.unwrap(), NOT_FOUND_ANSWER);
        assert!(generator.last_prompt().contains("<context>\n\n</context>"));
    }

    #[tokio::test]
    async fn retrieval_is_limited_to_top_k_and_ranked() {
        let documents = RawDocument::from_texts([
            "Rust ownership moves values between bindings.",
            "Sourdough needs a ripe starter and a long proof.",
            "Borrowing in Rust lends references without moving ownership.",
            "Tomatoes ripen faster next to bananas.",
        ]);
        let options = PipelineOptions {
            top_k: 2,
            ..PipelineOptions::default()
        };
        let pipeline = AnsweringPipeline::build(
            documents,
            CharacterNgramEmbedder::default(),
            RecordingGenerator::replying("ok"),
            options,
        )
        .await
        .unwrap();

        let first = pipeline.retrieve("Rust ownership and borrowing").await.unwrap();
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|text| text.contains("Rust")));
        assert_eq!(
            pipeline.retrieve("Rust ownership and borrowing").await.unwrap(),
            first
        );
    }

    #[tokio::test]
    async fn slow_generator_times_out() {
        let pipeline = AnsweringPipeline::build(
            france(),
            CharacterNgramEmbedder::default(),
            SlowGenerator(Duration::from_secs(5)),
            PipelineOptions::default(),
        )
        .await
        .unwrap();

        let started = Instant::now();
        let error = pipeline
            .ask_within("What is the capital of France?", Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(matches!(error, RagError::Timeout(_)));
        assert_eq!(error.kind(), ErrorKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn embedder_failure_is_upstream() {
        let result = AnsweringPipeline::build(
            france(),
            FailingEmbedder,
            RecordingGenerator::replying("Paris"),
            PipelineOptions::default(),
        )
        .await;

        match result {
            Err(error) => assert_eq!(error.kind(), ErrorKind::Upstream),
            Ok(_) => panic!("build should fail when the embedder is down"),
        }
    }

    #[tokio::test]
    async fn generator_failure_is_upstream() {
        let pipeline = AnsweringPipeline::build(
            france(),
            CharacterNgramEmbedder::default(),
            FailingGenerator,
            PipelineOptions::default(),
        )
        .await
        .unwrap();

        let error = pipeline
            .ask_within("What is the capital of France?", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Upstream);
        assert!(error.to_string().contains("over capacity"));
    }

    #[tokio::test]
    async fn invalid_options_fail_before_any_backend_call() {
        let options = PipelineOptions {
            chunking: crate::ChunkingConfig {
                size: 100,
                overlap: 100,
            },
            ..PipelineOptions::default()
        };
        let result =
            AnsweringPipeline::build(france(), FailingEmbedder, RecordingGenerator::replying(""), options)
                .await;
        assert!(matches!(result, Err(RagError::InvalidChunkConfig(_))));
    }

    #[tokio::test]
    async fn blank_question_is_rejected() {
        let generator = Arc::new(RecordingGenerator::replying("Paris"));
        let pipeline = AnsweringPipeline::build(
            france(),
            CharacterNgramEmbedder::default(),
            generator.clone(),
            PipelineOptions::default(),
        )
        .await
        .unwrap();

        assert!(matches!(
            pipeline.ask("   ").await,
            Err(RagError::InvalidQuestion(_))
        ));
        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn flashcards_are_extracted_from_model_output() {
        let reply = "Sure!\n```json\n[{\"question\":\"Capital of France?\",\"answer\":\"Paris\"},{\"question\":\"Largest city?\"}]\n```";
        let generator = Arc::new(RecordingGenerator::replying(reply));
        let pipeline = AnsweringPipeline::build(
            france(),
            CharacterNgramEmbedder::default(),
            generator.clone(),
            PipelineOptions::default(),
        )
        .await
        .unwrap();

        let extraction = pipeline.flashcards().await.unwrap();
        assert_eq!(extraction.cards().len(), 2);
        assert_eq!(extraction.substituted(), 1);
        assert!(generator.last_prompt().contains(FLASHCARD_REQUEST));
    }

    #[tokio::test]
    async fn unparseable_flashcards_fail_with_raw_text() {
        let pipeline = AnsweringPipeline::build(
            france(),
            CharacterNgramEmbedder::default(),
            RecordingGenerator::replying("I cannot do that."),
            PipelineOptions::default(),
        )
        .await
        .unwrap();

        let error = pipeline.flashcards().await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Parse);
        assert_eq!(error.raw_output(), Some("I cannot do that."));
    }

    #[tokio::test]
    async fn concurrent_questions_share_one_pipeline() {
        let pipeline = Arc::new(
            AnsweringPipeline::build(
                france(),
                CharacterNgramEmbedder::default(),
                RecordingGenerator::replying("Paris"),
                PipelineOptions::default(),
            )
            .await
            .unwrap(),
        );

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move { pipeline.ask("What is the capital of France?").await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "Paris");
        }
    }
}
