use crate::embeddings::EmbeddingProvider;
use crate::error::IngestError;
use crate::extractor::TextExtractor;
use crate::models::{clean_document_title, DocumentContent, DocumentRecord};
use crate::segmenter::SentenceSegmenter;
use crate::store::{DocumentEntry, DocumentStore};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Last-resort segment width when the layered segmenter cannot find two
/// units in the text.
const FORCED_CHUNK_CHARS: usize = 100;
const MIN_TEXT_FOR_FORCED_CHUNKS: usize = 50;

/// Orchestrates extractor → segmenter → embedding provider → store.
///
/// Only two conditions abort an ingestion: no extractable text at all, and
/// no embeddings at all. Everything else degrades per unit and the document
/// still lands in the store.
pub struct IngestionPipeline {
    extractor: Box<dyn TextExtractor + Send + Sync>,
    segmenter: SentenceSegmenter,
    provider: Arc<EmbeddingProvider>,
    store: Arc<DocumentStore>,
}

impl IngestionPipeline {
    pub fn new(
        extractor: Box<dyn TextExtractor + Send + Sync>,
        provider: Arc<EmbeddingProvider>,
        store: Arc<DocumentStore>,
    ) -> Result<Self, IngestError> {
        Ok(Self {
            extractor,
            segmenter: SentenceSegmenter::new()?,
            provider,
            store,
        })
    }

    /// Ingests one document and returns its freshly allocated identifier.
    /// The display name defaults to the path's file name.
    pub async fn ingest(
        &self,
        path: &Path,
        display_name: Option<&str>,
    ) -> Result<String, IngestError> {
        let name = match display_name {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.to_string())
                .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?,
        };

        info!(name = %name, "processing document");

        let text = match self.extractor.extract_text(path) {
            Ok(text) => text,
            Err(error) => {
                warn!(%error, "extraction failed, treating document as empty");
                String::new()
            }
        };

        if text.trim().is_empty() {
            return Err(IngestError::NoExtractableText(name));
        }
        debug!(chars = text.chars().count(), "extracted text");

        let mut sentences = self.segmenter.segment(&text);
        if sentences.len() < 2 && text.chars().count() > MIN_TEXT_FOR_FORCED_CHUNKS {
            sentences = forced_chunks(&text);
            warn!(
                segments = sentences.len(),
                "segmenter found too little structure, forced fixed-width segmentation"
            );
        }

        // Title and descriptor sentences exist purely to improve retrieval
        // for "what is this document about" style questions.
        let title = clean_document_title(&name);
        let already_present = sentences
            .iter()
            .any(|sentence| sentence.trim_end_matches(['.', '!', '?']) == title);
        if !already_present {
            sentences.insert(0, format!("{title}."));
        }
        sentences.insert(1, format!("This document is about {title}."));

        let sentences: Vec<String> = sentences
            .into_iter()
            .filter(|sentence| !sentence.trim().is_empty())
            .collect();

        let total = sentences.len();
        let mut embeddings = Vec::with_capacity(total);
        for (index, sentence) in sentences.iter().enumerate() {
            embeddings.push(self.provider.embed_or_zero(sentence).await);
            if total > 100 && index % 50 == 0 {
                debug!(index, total, "embedding progress");
            }
        }

        if embeddings.is_empty() {
            return Err(IngestError::EmbeddingFailure(name));
        }

        let record = DocumentRecord {
            id: Uuid::new_v4().to_string(),
            name,
            source_path: path.to_string_lossy().to_string(),
            checksum: digest_file(path)?,
            ingested_at: Utc::now(),
        };
        let id = record.id.clone();

        self.store.insert(DocumentEntry {
            record,
            content: DocumentContent { text, sentences },
            embeddings,
        });

        info!(id = %id, "document ingested");
        Ok(id)
    }
}

/// Recursively finds every PDF under a folder, sorted for stable ingestion
/// order.
pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

fn forced_chunks(text: &str) -> Vec<String> {
    text.chars()
        .collect::<Vec<_>>()
        .chunks(FORCED_CHUNK_CHARS)
        .map(|chunk| chunk.iter().collect::<String>())
        .filter(|chunk| !chunk.trim().is_empty())
        .map(|chunk| format!("{chunk}."))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{digest_file, discover_pdf_files, IngestionPipeline};
    use crate::embeddings::{EmbeddingProvider, HashedNgramEmbedder};
    use crate::error::IngestError;
    use crate::extractor::TextExtractor;
    use crate::store::DocumentStore;
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::tempdir;

    struct FixedTextExtractor {
        text: String,
    }

    impl TextExtractor for FixedTextExtractor {
        fn extract_text(&self, _path: &Path) -> Result<String, IngestError> {
            Ok(self.text.clone())
        }
    }

    fn pipeline_with_text(text: &str, store: Arc<DocumentStore>) -> IngestionPipeline {
        let provider = Arc::new(EmbeddingProvider::from_embedder(Box::new(
            HashedNgramEmbedder { dimensions: 32 },
        )));
        IngestionPipeline::new(
            Box::new(FixedTextExtractor {
                text: text.to_string(),
            }),
            provider,
            store,
        )
        .expect("pipeline should build")
    }

    #[tokio::test]
    async fn ingestion_injects_title_and_descriptor() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("quarterly_report.pdf");
        fs::write(&path, b"%PDF-1.4")?;

        let store = Arc::new(DocumentStore::new());
        let pipeline =
            pipeline_with_text("Quarterly Report. Revenue increased by 12%.", store.clone());

        let id = pipeline.ingest(&path, None).await?;
        let entry = store.get(&id).expect("document should be stored");

        assert_eq!(entry.record.name, "quarterly_report.pdf");
        assert_eq!(entry.content.sentences[0], "quarterly report.");
        assert_eq!(
            entry.content.sentences[1],
            "This document is about quarterly report."
        );
        assert!(entry.content.sentences.len() >= 4);
        assert_eq!(entry.content.sentences.len(), entry.embeddings.len());
        Ok(())
    }

    #[tokio::test]
    async fn same_content_twice_yields_distinct_ids() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("doc.pdf");
        fs::write(&path, b"%PDF-1.4")?;

        let store = Arc::new(DocumentStore::new());
        let pipeline = pipeline_with_text("One sentence. Another sentence.", store.clone());

        let first = pipeline.ingest(&path, None).await?;
        let second = pipeline.ingest(&path, None).await?;

        assert_ne!(first, second);
        assert_eq!(store.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn empty_text_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("blank.pdf");
        fs::write(&path, b"%PDF-1.4")?;

        let store = Arc::new(DocumentStore::new());
        let pipeline = pipeline_with_text("   ", store.clone());

        let result = pipeline.ingest(&path, None).await;
        assert!(matches!(result, Err(IngestError::NoExtractableText(_))));
        assert!(store.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unsegmentable_text_is_force_chunked() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("dense.pdf");
        fs::write(&path, b"%PDF-1.4")?;

        // 150 chars, no punctuation and too short for the word-count
        // fallback, so the pipeline has to force fixed-width chunks.
        let text = "x".repeat(150);
        let store = Arc::new(DocumentStore::new());
        let pipeline = pipeline_with_text(&text, store.clone());

        let id = pipeline.ingest(&path, None).await?;
        let entry = store.get(&id).expect("document should be stored");

        // title + descriptor + two forced chunks
        assert_eq!(entry.content.sentences.len(), 4);
        Ok(())
    }

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;

        File::create(dir.path().join("a.pdf")).and_then(|mut f| f.write_all(b"%PDF-1.4"))?;
        File::create(nested.join("b.pdf")).and_then(|mut f| f.write_all(b"%PDF-1.4"))?;
        File::create(dir.path().join("notes.txt")).and_then(|mut f| f.write_all(b"text"))?;

        let files = discover_pdf_files(dir.path());
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn checksum_is_reproducible() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("a.pdf");
        fs::write(&path, b"abc")?;

        assert_eq!(digest_file(&path)?, digest_file(&path)?);
        Ok(())
    }
}
