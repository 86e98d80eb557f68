mod repl;
mod server;

use axum::http::HeaderValue;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use second_brain_core::{
    AnsweringPipeline, CharacterNgramEmbedder, ChatCompletionGenerator, ChunkingConfig,
    DocumentSource, Embedder, Flashcard, Generator, HttpJsonSource, JsonFileSource,
    OllamaEmbedder, PipelineOptions, RagError, SimilarityMetric, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL, DEFAULT_OLLAMA_URL,
};
use server::{AppState, Pipeline};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "second-brain", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// URL of the corpus object (JSON array of strings), e.g. an S3 object URL
    #[arg(long, env = "SECOND_BRAIN_CORPUS_URL")]
    corpus_url: Option<String>,

    /// Local corpus file (JSON array of strings); takes precedence over the URL
    #[arg(long, env = "SECOND_BRAIN_CORPUS_FILE")]
    corpus_file: Option<String>,

    /// Bearer token sent with the corpus request
    #[arg(long, env = "SECOND_BRAIN_CORPUS_TOKEN", hide_env_values = true)]
    corpus_token: Option<String>,

    /// Embedding backend
    #[arg(long, value_enum, default_value = "ollama")]
    embedder: EmbedderKind,

    /// Ollama base URL
    #[arg(long, env = "OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// Embedding model served by Ollama
    #[arg(long, env = "EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Texts per embedding request
    #[arg(long, env = "EMBEDDING_BATCH", default_value = "32")]
    embedding_batch: usize,

    /// OpenAI-compatible chat completions base URL
    #[arg(long, env = "LLM_BASE_URL", default_value = DEFAULT_LLM_BASE_URL)]
    llm_url: String,

    /// Chat model identifier
    #[arg(long, env = "LLM_MODEL", default_value = DEFAULT_LLM_MODEL)]
    llm_model: String,

    /// API key for the chat completions endpoint
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    llm_api_key: Option<String>,

    /// Sampling temperature; the provider default applies when unset
    #[arg(long, env = "LLM_TEMPERATURE")]
    temperature: Option<f32>,

    /// Chunk window in characters
    #[arg(long, env = "CHUNK_SIZE", default_value = "1000")]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, env = "CHUNK_OVERLAP", default_value = "200")]
    chunk_overlap: usize,

    /// Chunks retrieved per question
    #[arg(long, env = "TOP_K", default_value = "4")]
    top_k: usize,

    /// Similarity metric for retrieval
    #[arg(long, env = "SIMILARITY_METRIC", value_enum, default_value = "cosine")]
    metric: MetricArg,

    /// Seconds allowed per question before giving up
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "60")]
    timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        /// Listen address
        #[arg(long, env = "SECOND_BRAIN_BIND", default_value = "127.0.0.1:8000")]
        bind: SocketAddr,
        /// Origins allowed by CORS (repeatable)
        #[arg(
            long = "allowed-origin",
            default_values = ["http://localhost:5173", "http://localhost:3000"]
        )]
        allowed_origins: Vec<String>,
    },
    /// Ask one question and print the answer.
    Ask {
        #[arg(long)]
        question: String,
    },
    /// Generate flashcards from the corpus.
    Flashcards,
    /// Interactive prompt with session history.
    Repl,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    Ollama,
    /// Offline character n-gram hashing, no service required
    Ngram,
}

#[derive(Clone, Copy, ValueEnum)]
enum MetricArg {
    Cosine,
    L2,
}

impl From<MetricArg> for SimilarityMetric {
    fn from(value: MetricArg) -> Self {
        match value {
            MetricArg::Cosine => SimilarityMetric::Cosine,
            MetricArg::L2 => SimilarityMetric::L2,
        }
    }
}

impl Cli {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn pipeline_options(&self) -> Result<PipelineOptions, RagError> {
        let options = PipelineOptions {
            chunking: ChunkingConfig::new(self.chunk_size, self.chunk_overlap)?,
            top_k: self.top_k,
            metric: self.metric.into(),
            timeout: self.timeout(),
        };
        options.validate()?;
        Ok(options)
    }

    fn document_source(&self) -> Result<Box<dyn DocumentSource>, RagError> {
        if let Some(path) = &self.corpus_file {
            return Ok(Box::new(JsonFileSource::new(path)));
        }
        if let Some(url) = &self.corpus_url {
            return Ok(Box::new(HttpJsonSource::new(url, self.corpus_token.clone())?));
        }
        Err(RagError::Configuration(
            "no corpus configured: set --corpus-url or --corpus-file".to_string(),
        ))
    }

    fn embedder(&self) -> Result<Arc<dyn Embedder>, RagError> {
        let embedder: Arc<dyn Embedder> = match self.embedder {
            EmbedderKind::Ollama => Arc::new(
                OllamaEmbedder::new(&self.ollama_url, self.embedding_model.clone())?
                    .with_batch_size(self.embedding_batch),
            ),
            EmbedderKind::Ngram => Arc::new(CharacterNgramEmbedder::default()),
        };
        Ok(embedder)
    }

    fn generator(&self) -> Result<Arc<dyn Generator>, RagError> {
        let api_key = self.llm_api_key.clone().ok_or_else(|| {
            RagError::Configuration("GROQ_API_KEY (or --llm-api-key) is not set".to_string())
        })?;
        let mut generator =
            ChatCompletionGenerator::new(&self.llm_url, api_key, self.llm_model.clone())?;
        if let Some(temperature) = self.temperature {
            generator = generator.with_temperature(temperature);
        }
        Ok(Arc::new(generator))
    }

    /// Validates every setting before touching the corpus or any backend.
    async fn build_pipeline(&self) -> Result<Pipeline, RagError> {
        let options = self.pipeline_options()?;
        let source = self.document_source()?;
        let embedder = self.embedder()?;
        let generator = self.generator()?;

        AnsweringPipeline::from_source(source.as_ref(), embedder, generator, options).await
    }
}

pub(crate) fn render_cards(cards: &[Flashcard]) -> String {
    if cards.is_empty() {
        return "No flashcards were generated.".to_string();
    }

    cards
        .iter()
        .enumerate()
        .map(|(index, card)| format!("Card {}: {}\n  {}", index + 1, card.question, card.answer))
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "second-brain boot"
    );

    match &cli.command {
        Command::Serve {
            bind,
            allowed_origins,
        } => {
            let origins = allowed_origins
                .iter()
                .map(|origin| HeaderValue::from_str(origin))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|error| anyhow::anyhow!("invalid --allowed-origin: {error}"))?;

            let pipeline = cli.build_pipeline().await;
            let state = AppState::new(pipeline, cli.timeout());
            server::serve(state, *bind, origins).await?;
        }
        Command::Ask { question } => {
            let pipeline = cli.build_pipeline().await?;
            let answer = pipeline.ask_timed(question).await?;
            println!("{answer}");
        }
        Command::Flashcards => {
            let pipeline = cli.build_pipeline().await?;
            match pipeline.flashcards_within(cli.timeout()).await {
                Ok(extraction) => println!("{}", render_cards(extraction.cards())),
                Err(error @ RagError::Parse { .. }) => {
                    eprintln!("Could not parse model output as JSON. Raw output:");
                    eprintln!("{}", error.raw_output().unwrap_or_default());
                    return Err(error.into());
                }
                Err(error) => return Err(error.into()),
            }
        }
        Command::Repl => {
            let pipeline = cli.build_pipeline().await?;
            repl::run(&pipeline, cli.timeout()).await?;
        }
    }

    Ok(())
}
