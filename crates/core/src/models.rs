use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registration facts for one ingested document. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub name: String,
    pub source_path: String,
    pub checksum: String,
    pub ingested_at: DateTime<Utc>,
}

/// Extracted text plus its ordered sentence segmentation. Sentence order is
/// meaningful: context windows are built from neighbouring positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentContent {
    pub text: String,
    pub sentences: Vec<String>,
}

/// One scored sentence hit for a single question. Never stored.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub sentence: String,
    pub context: String,
    pub similarity: f32,
    pub doc_id: String,
}

/// The structured response handed back across the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub confidence: f32,
    pub source_document: String,
    pub source_text: String,
}

impl Answer {
    pub fn fallback(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            confidence: 0.0,
            source_document: String::new(),
            source_text: String::new(),
        }
    }
}

/// Turns a display name into a human-readable title: the final extension is
/// dropped and separator characters become spaces.
pub fn clean_document_title(name: &str) -> String {
    let stem = match name.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => name,
    };
    stem.replace(['_', '-'], " ").trim().to_string()
}
