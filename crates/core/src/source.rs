use crate::error::RagError;
use crate::models::RawDocument;
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tracing::info;
use url::Url;

/// Supplies the whole corpus in one read. Documents keep the order of the
/// stored collection.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch_corpus(&self) -> Result<Vec<RawDocument>, RagError>;
}

/// Corpus stored as a JSON array of strings behind an object URL, for example
/// an S3 object or a pre-signed link to one.
pub struct HttpJsonSource {
    client: Client,
    url: Url,
    bearer_token: Option<String>,
}

impl HttpJsonSource {
    pub fn new(url: &str, bearer_token: Option<String>) -> Result<Self, RagError> {
        let url = Url::parse(url.trim())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RagError::Configuration(format!(
                "corpus url must be http or https, got {}",
                url.scheme()
            )));
        }

        let bearer_token = bearer_token.and_then(|value| {
            let token = value.trim().to_string();
            if token.is_empty() {
                None
            } else {
                Some(token)
            }
        });

        Ok(Self {
            client: Client::new(),
            url,
            bearer_token,
        })
    }
}

#[async_trait]
impl DocumentSource for HttpJsonSource {
    async fn fetch_corpus(&self) -> Result<Vec<RawDocument>, RagError> {
        let mut request = self.client.get(self.url.clone());
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(RagError::upstream(
                "document source",
                format!("{} returned {}", self.url, response.status()),
            ));
        }

        let body = response.bytes().await?;
        let documents = parse_corpus(&body)?;
        info!(url = %self.url, documents = documents.len(), "fetched corpus");
        Ok(documents)
    }
}

#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl DocumentSource for JsonFileSource {
    async fn fetch_corpus(&self) -> Result<Vec<RawDocument>, RagError> {
        let bytes = tokio::fs::read(&self.path).await?;
        let documents = parse_corpus(&bytes)?;
        info!(path = %self.path.display(), documents = documents.len(), "loaded corpus");
        Ok(documents)
    }
}

/// Decodes a JSON array of strings into documents numbered by position.
pub fn parse_corpus(bytes: &[u8]) -> Result<Vec<RawDocument>, RagError> {
    let texts: Vec<String> = serde_json::from_slice(bytes)?;
    Ok(RawDocument::from_texts(texts))
}
