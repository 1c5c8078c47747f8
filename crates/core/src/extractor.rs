use crate::error::IngestError;
use lopdf::Document;
use std::path::Path;
use tracing::warn;

/// Best-effort plain-text extraction from a document artifact.
///
/// Implementations absorb per-page failures and keep going; an empty string
/// is a valid outcome and means the artifact had no readable text.
pub trait TextExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl TextExtractor for LopdfExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, IngestError> {
        let document = match Document::load(path) {
            Ok(document) => document,
            Err(error) => {
                warn!(path = %path.display(), %error, "unable to open pdf");
                return Ok(String::new());
            }
        };

        let mut text = String::new();
        for (page_no, _page_id) in document.get_pages() {
            match document.extract_text(&[page_no]) {
                Ok(page_text) => {
                    if !page_text.trim().is_empty() {
                        text.push_str(&page_text);
                        text.push(' ');
                    }
                }
                Err(error) => {
                    warn!(page = page_no, %error, "skipping unreadable pdf page");
                }
            }
        }

        Ok(normalize_whitespace(&text))
    }
}

/// Collapses all whitespace runs (including non-breaking spaces) to single
/// spaces and trims the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::{normalize_whitespace, LopdfExtractor, TextExtractor};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof \u{a0} spacing  ";
        assert_eq!(normalize_whitespace(input), "A lot of spacing");
    }

    #[test]
    fn unreadable_pdf_yields_empty_text() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4\n%broken")?;

        let text = LopdfExtractor.extract_text(&path)?;
        assert!(text.is_empty());
        Ok(())
    }

    #[test]
    fn missing_file_yields_empty_text() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("absent.pdf");

        let text = LopdfExtractor.extract_text(&path)?;
        assert!(text.is_empty());
        Ok(())
    }
}
