use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("no extractable text in {0}")]
    NoExtractableText(String),

    #[error("no embeddings could be generated for {0}")]
    EmbeddingFailure(String),
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("invalid embedding endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding backend returned {status}")]
    Backend { status: u16 },

    #[error("embedding payload error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("embedding dimension {actual} does not match configured {expected}")]
    Dimensions { expected: usize, actual: usize },
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
