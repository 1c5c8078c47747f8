pub mod embeddings;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod segmenter;
pub mod store;

pub use embeddings::{
    cosine_similarity, Embedder, EmbeddingConfig, EmbeddingProvider, HashedNgramEmbedder,
    HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_ENDPOINT,
    DEFAULT_EMBEDDING_MODEL,
};
pub use engine::AnswerEngine;
pub use error::{EmbedError, IngestError};
pub use extractor::{normalize_whitespace, LopdfExtractor, TextExtractor};
pub use ingest::{digest_file, discover_pdf_files, IngestionPipeline};
pub use models::{clean_document_title, Answer, DocumentContent, DocumentRecord, QueryMatch};
pub use segmenter::SentenceSegmenter;
pub use store::{DocumentEntry, DocumentStore};
