use crate::error::EmbedError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";
pub const DEFAULT_EMBEDDING_ENDPOINT: &str = "http://localhost:11434/api/embeddings";

/// Inputs are cut to this many characters before the model sees them; the
/// model applies its own token budget on top.
const MAX_EMBED_CHARS: usize = 1000;

#[async_trait]
pub trait Embedder {
    fn dimensions(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Embedding endpoint; `None` selects the local hashed embedder directly.
    pub endpoint: Option<String>,
    pub model: String,
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: Some(DEFAULT_EMBEDDING_ENDPOINT.to_string()),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Client for an Ollama-style embeddings endpoint.
pub struct HttpEmbedder {
    endpoint: Url,
    model: String,
    dimensions: usize,
    client: reqwest::Client,
}

impl HttpEmbedder {
    pub fn new(endpoint: &str, model: &str, dimensions: usize) -> Result<Self, EmbedError> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            model: model.to_string(),
            dimensions,
            client: reqwest::Client::new(),
        })
    }

    /// One round trip to confirm the endpoint answers with vectors of the
    /// configured size.
    pub async fn probe(&self) -> Result<(), EmbedError> {
        self.embed("embedding endpoint probe").await.map(|_| ())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbedError::Backend {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let parsed: EmbeddingResponse = serde_json::from_str(&body)?;

        if parsed.embedding.len() != self.dimensions {
            return Err(EmbedError::Dimensions {
                expected: self.dimensions,
                actual: parsed.embedding.len(),
            });
        }

        Ok(parsed.embedding)
    }
}

/// Deterministic character-trigram embedder. Stands in for the hosted model
/// when its endpoint is unreachable, and backs the test suite.
#[derive(Debug, Clone, Copy)]
pub struct HashedNgramEmbedder {
    pub dimensions: usize,
}

impl Default for HashedNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

#[async_trait]
impl Embedder for HashedNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return Ok(vector);
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        Ok(vector)
    }
}

/// Owns the degradation contract around an embedder: long inputs are
/// truncated up front and any per-call failure turns into a zero vector so
/// downstream similarity decays to zero instead of erroring.
pub struct EmbeddingProvider {
    embedder: Box<dyn Embedder + Send + Sync>,
}

impl EmbeddingProvider {
    pub fn from_embedder(embedder: Box<dyn Embedder + Send + Sync>) -> Self {
        Self { embedder }
    }

    /// Builds the provider from config: the HTTP model when it can be
    /// reached, otherwise the hashed fallback embedder.
    pub async fn connect(config: &EmbeddingConfig) -> Self {
        if let Some(endpoint) = &config.endpoint {
            match HttpEmbedder::new(endpoint, &config.model, config.dimensions) {
                Ok(http) => match http.probe().await {
                    Ok(()) => {
                        info!(%endpoint, model = %config.model, "embedding endpoint ready");
                        return Self::from_embedder(Box::new(http));
                    }
                    Err(error) => {
                        warn!(%endpoint, %error, "embedding endpoint unreachable, using hashed fallback embedder");
                    }
                },
                Err(error) => {
                    warn!(%endpoint, %error, "invalid embedding endpoint, using hashed fallback embedder");
                }
            }
        }

        Self::from_embedder(Box::new(HashedNgramEmbedder {
            dimensions: config.dimensions,
        }))
    }

    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.embedder.embed(truncate_chars(text, MAX_EMBED_CHARS)).await
    }

    /// The documented failure contract: log and return a zero vector.
    pub async fn embed_or_zero(&self, text: &str) -> Vec<f32> {
        match self.embed(text).await {
            Ok(vector) => vector,
            Err(error) => {
                warn!(%error, "embedding failed, substituting zero vector");
                vec![0.0; self.dimensions()]
            }
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_offset, _)) => &text[..byte_offset],
        None => text,
    }
}

/// Normalized dot product in [-1, 1]; zero-magnitude or mismatched vectors
/// score 0.0 so failed embeddings rank last rather than producing NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingEmbedder {
        dimensions: usize,
    }

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn dimensions(&self) -> usize {
            self.dimensions
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Err(EmbedError::Backend { status: 500 })
        }
    }

    #[tokio::test]
    async fn hashed_embedder_is_deterministic() {
        let embedder = HashedNgramEmbedder::default();
        let first = embedder.embed("hydraulic pressure and flow").await.unwrap();
        let second = embedder.embed("hydraulic pressure and flow").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), DEFAULT_EMBEDDING_DIMENSIONS);
    }

    #[tokio::test]
    async fn hashed_embedder_output_is_unit_length() {
        let embedder = HashedNgramEmbedder { dimensions: 64 };
        let vector = embedder.embed("some sentence to embed").await.unwrap();
        let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn provider_truncates_long_input() {
        let provider = EmbeddingProvider::from_embedder(Box::new(HashedNgramEmbedder::default()));
        let long = "a".repeat(5000);
        let truncated = "a".repeat(1000);
        let from_long = provider.embed(&long).await.unwrap();
        let from_truncated = provider.embed(&truncated).await.unwrap();
        assert_eq!(from_long, from_truncated);
    }

    #[tokio::test]
    async fn provider_substitutes_zero_vector_on_failure() {
        let provider =
            EmbeddingProvider::from_embedder(Box::new(FailingEmbedder { dimensions: 16 }));
        let vector = provider.embed_or_zero("anything").await;
        assert_eq!(vector, vec![0.0; 16]);
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5, 0.25, 0.1];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_of_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 1.0]), 0.0);
    }
}
