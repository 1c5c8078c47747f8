use crate::embeddings::{cosine_similarity, EmbeddingProvider};
use crate::models::{clean_document_title, Answer, QueryMatch};
use crate::store::{DocumentEntry, DocumentStore};
use std::sync::Arc;
use tracing::{debug, warn};

/// Questions containing any of these are asking what a document is, not
/// what it says, and get rewritten to the canonical topic probe so they
/// align with the descriptor sentences injected at ingestion.
const TOPIC_INTENT_PHRASES: [&str; 5] = ["main topic", "about", "summary", "overview", "purpose"];
const TOPIC_PROBE: &str = "This document discusses or summarizes the following topic:";

const PURPOSE_TERMS: [&str; 7] = [
    "purpose",
    "aim",
    "goal",
    "objective",
    "description",
    "coursework",
    "assignment",
];
const EXPECTATION_TERMS: [&str; 4] = ["expect", "requirement", "must", "should"];

const TOP_MATCHES_PER_DOCUMENT: usize = 10;
const TOPIC_MATCH_POOL: usize = 5;
const TOPIC_SENTENCE_COUNT: usize = 3;
const INDICATOR_SENTENCE_COUNT: usize = 2;
const CONTEXT_RADIUS: usize = 2;
const LOW_CONFIDENCE_THRESHOLD: f32 = 0.15;

const NO_DOCUMENTS_ANSWER: &str = "No documents have been loaded yet.";
const NO_MATCH_ANSWER: &str =
    "I couldn't find a relevant answer to your question in the provided documents.";
const LOW_CONFIDENCE_ANSWER: &str = "I couldn't find a specific answer to your question. \
     Try asking a more specific question about the document content.";

/// Answers questions by cosine-similarity retrieval over stored sentence
/// embeddings, followed by rule-based answer stitching. Soft failure modes
/// (no documents, nothing relevant, low confidence) are answers, not errors.
pub struct AnswerEngine {
    store: Arc<DocumentStore>,
    provider: Arc<EmbeddingProvider>,
}

impl AnswerEngine {
    pub fn new(store: Arc<DocumentStore>, provider: Arc<EmbeddingProvider>) -> Self {
        Self { store, provider }
    }

    pub async fn answer(&self, question: &str, doc_ids: Option<&[String]>) -> Answer {
        let subset = doc_ids.filter(|ids| !ids.is_empty());
        let selected = self.store.select(subset);

        if subset.is_none() && selected.is_empty() {
            return Answer::fallback(NO_DOCUMENTS_ANSWER);
        }

        debug!(documents = selected.len(), question, "answering question");

        let topic_intent = has_topic_intent(question);
        let probe = if topic_intent { TOPIC_PROBE } else { question };
        let question_embedding = self.provider.embed_or_zero(probe).await;

        let mut matches: Vec<QueryMatch> = Vec::new();
        for entry in &selected {
            matches.extend(score_document(entry, &question_embedding));
        }
        matches.sort_by(|left, right| right.similarity.total_cmp(&left.similarity));

        let Some(best) = matches.first() else {
            return Answer::fallback(NO_MATCH_ANSWER);
        };
        let best_name = document_name(&selected, &best.doc_id);

        if topic_intent {
            return compose_topic_answer(question, &matches, &best_name);
        }

        if best.similarity < LOW_CONFIDENCE_THRESHOLD {
            return Answer {
                answer: LOW_CONFIDENCE_ANSWER.to_string(),
                confidence: confidence(best.similarity),
                source_document: best_name,
                source_text: String::new(),
            };
        }

        Answer {
            answer: best.context.clone(),
            confidence: confidence(best.similarity),
            source_document: best_name,
            source_text: best.context.clone(),
        }
    }
}

fn has_topic_intent(question: &str) -> bool {
    let lowered = question.to_lowercase();
    TOPIC_INTENT_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
}

/// Scores every sentence of one document against the question embedding and
/// keeps the top matches, each wrapped in its surrounding context window.
fn score_document(entry: &DocumentEntry, question_embedding: &[f32]) -> Vec<QueryMatch> {
    let sentences = &entry.content.sentences;
    let embeddings = &entry.embeddings;

    let common = sentences.len().min(embeddings.len());
    if sentences.len() != embeddings.len() {
        warn!(
            document = %entry.record.id,
            sentences = sentences.len(),
            embeddings = embeddings.len(),
            "mismatched sentence and embedding counts, truncating to the shorter"
        );
    }
    if common == 0 {
        return Vec::new();
    }

    let sentences = &sentences[..common];
    let mut scored: Vec<(usize, f32)> = embeddings[..common]
        .iter()
        .enumerate()
        .map(|(index, embedding)| (index, cosine_similarity(question_embedding, embedding)))
        .collect();
    // Stable sort keeps insertion order between equal scores, so identical
    // inputs always produce identical results.
    scored.sort_by(|left, right| right.1.total_cmp(&left.1));

    scored
        .into_iter()
        .take(TOP_MATCHES_PER_DOCUMENT)
        .map(|(index, similarity)| QueryMatch {
            sentence: sentences[index].clone(),
            context: context_window(sentences, index),
            similarity,
            doc_id: entry.record.id.clone(),
        })
        .collect()
}

/// The matched sentence plus up to two neighbours on each side, clamped to
/// the document bounds.
fn context_window(sentences: &[String], index: usize) -> String {
    let start = index.saturating_sub(CONTEXT_RADIUS);
    let end = (index + CONTEXT_RADIUS + 1).min(sentences.len());
    sentences[start..end].join(" ")
}

/// Rule-based synthesis for topic/summary/purpose questions: a fixed
/// template per intent, filled from the top pooled matches.
fn compose_topic_answer(question: &str, matches: &[QueryMatch], doc_name: &str) -> Answer {
    let top: Vec<&QueryMatch> = matches.iter().take(TOPIC_MATCH_POOL).collect();
    let title = clean_document_title(doc_name);
    let best = matches[0].clone();

    let answer = if question.to_lowercase().contains("purpose") {
        let indicators = sentences_containing(&top, &PURPOSE_TERMS);
        if indicators.is_empty() {
            format!(
                "This document titled '{title}' appears to be about {}",
                joined_sentences(&top, TOPIC_SENTENCE_COUNT)
            )
        } else {
            let mut text = format!(
                "This document titled '{title}' appears to be a coursework description \
                 document. Its main purpose is to outline {}",
                indicators
                    .iter()
                    .take(INDICATOR_SENTENCE_COUNT)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(" ")
            );

            let expectations = sentences_containing(&top, &EXPECTATION_TERMS);
            if !expectations.is_empty() {
                text.push_str(" The document specifies that ");
                text.push_str(
                    &expectations
                        .iter()
                        .take(INDICATOR_SENTENCE_COUNT)
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(" "),
                );
            }
            text
        }
    } else {
        format!(
            "This document titled '{title}' covers {}",
            joined_sentences(&top, TOPIC_SENTENCE_COUNT)
        )
    };

    Answer {
        answer,
        confidence: confidence(best.similarity),
        source_document: doc_name.to_string(),
        source_text: best.context,
    }
}

fn sentences_containing<'a>(matches: &[&'a QueryMatch], terms: &[&str]) -> Vec<&'a str> {
    matches
        .iter()
        .filter(|hit| {
            let lowered = hit.sentence.to_lowercase();
            terms.iter().any(|term| lowered.contains(term))
        })
        .map(|hit| hit.sentence.as_str())
        .collect()
}

fn joined_sentences(matches: &[&QueryMatch], count: usize) -> String {
    matches
        .iter()
        .take(count)
        .map(|hit| hit.sentence.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn document_name(selected: &[Arc<DocumentEntry>], doc_id: &str) -> String {
    selected
        .iter()
        .find(|entry| entry.record.id == doc_id)
        .map(|entry| entry.record.name.clone())
        .unwrap_or_default()
}

/// Answers advertise confidence in [0, 1]; cosine scores are pinned there.
fn confidence(similarity: f32) -> f32 {
    similarity.clamp(0.0, 1.0)
}
