use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid question: {0}")]
    InvalidQuestion(String),

    #[error("invalid response from {backend}: {details}")]
    Upstream { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("request timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("could not parse model output as JSON: {message}")]
    Parse { message: String, raw: String },

    #[error("embedding dimension {found} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Coarse classification used by callers that map failures to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Upstream,
    Timeout,
    Parse,
}

impl RagError {
    pub fn upstream(backend: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Upstream {
            backend: backend.into(),
            details: details.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_)
            | Self::InvalidChunkConfig(_)
            | Self::InvalidQuestion(_)
            | Self::Url(_)
            | Self::Regex(_) => ErrorKind::Configuration,
            Self::Upstream { .. }
            | Self::Http(_)
            | Self::Serialization(_)
            | Self::Io(_)
            | Self::DimensionMismatch { .. } => ErrorKind::Upstream,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Parse { .. } => ErrorKind::Parse,
        }
    }

    /// Unparsed model output attached to a [`RagError::Parse`].
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Self::Parse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

pub type Result<T, E = RagError> = std::result::Result<T, E>;
