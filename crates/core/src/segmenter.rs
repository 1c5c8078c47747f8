use crate::error::IngestError;
use regex::Regex;

const TERMINALS: [char; 3] = ['.', '!', '?'];
const SHORT_TITLE_CHARS: usize = 100;

/// Fallback strategies tried in order when the previous layer produced at
/// most one unit and the input is at least this long.
const FALLBACKS: [(usize, fn(&str) -> Vec<String>); 2] =
    [(100, split_on_bare_periods), (200, chunk_by_word_count)];

/// Splits normalized text into ordered, punctuation-terminated units.
///
/// The primary pass splits at terminal punctuation followed by whitespace,
/// skipping abbreviation-like and decimal-like tails. When that yields a
/// single unit, progressively cruder strategies take over so that any
/// non-empty input segments into at least one usable unit.
pub struct SentenceSegmenter {
    boundary: Regex,
}

impl SentenceSegmenter {
    pub fn new() -> Result<Self, IngestError> {
        Ok(Self {
            boundary: Regex::new(r"[.!?]\s")?,
        })
    }

    pub fn segment(&self, text: &str) -> Vec<String> {
        let mut units = split_at_boundaries(&self.boundary, text);

        for (min_chars, strategy) in FALLBACKS {
            if units.len() > 1 {
                break;
            }
            if text.chars().count() > min_chars {
                units = strategy(text);
            }
        }

        let mut units: Vec<String> = units
            .iter()
            .map(|unit| terminate(unit.trim()))
            .filter(|unit| !unit.is_empty())
            .collect();

        // A short opening unit is usually a title or header. Repeating it at
        // the end weights similarity search toward it, which helps with
        // "what is this document about" questions.
        if let Some(first) = units.first() {
            if first.chars().count() < SHORT_TITLE_CHARS {
                units.push(first.clone());
            }
        }

        units
    }
}

fn split_at_boundaries(boundary: &Regex, text: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut start = 0;

    for hit in boundary.find_iter(text) {
        let punct_end = hit.start() + 1;
        if guarded_tail(&text[..punct_end]) {
            continue;
        }
        let unit = text[start..punct_end].trim();
        if !unit.is_empty() {
            units.push(unit.to_string());
        }
        start = hit.end();
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        units.push(rest.to_string());
    }

    units
}

/// True when the text ending at a terminal punctuation mark looks like an
/// abbreviation ("Dr.") or a dotted token such as an initialism or decimal
/// ("U.S.", "v1.2."), in which case the boundary must not split.
fn guarded_tail(tail: &str) -> bool {
    let last: Vec<char> = tail.chars().rev().take(4).collect();

    if last.len() >= 3 && last[2].is_uppercase() && last[1].is_lowercase() && last[0] == '.' {
        return true;
    }

    last.len() >= 4 && is_word(last[3]) && last[2] == '.' && is_word(last[1])
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn split_on_bare_periods(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut units = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        let adjacent_digit = (i > 0 && chars[i - 1].is_ascii_digit())
            || chars.get(i + 1).is_some_and(|next| next.is_ascii_digit());
        if c == '.' && !adjacent_digit {
            push_chunk(&mut units, &current);
            current.clear();
        } else {
            current.push(c);
        }
    }
    push_chunk(&mut units, &current);

    units
}

fn chunk_by_word_count(text: &str) -> Vec<String> {
    const WORDS_PER_CHUNK: usize = 25;

    text.split_whitespace()
        .collect::<Vec<_>>()
        .chunks(WORDS_PER_CHUNK)
        .map(|words| format!("{}.", words.join(" ")))
        .collect()
}

fn push_chunk(units: &mut Vec<String>, chunk: &str) {
    let chunk = chunk.trim();
    if !chunk.is_empty() {
        units.push(format!("{chunk}."));
    }
}

fn terminate(unit: &str) -> String {
    if unit.is_empty() || unit.ends_with(TERMINALS) {
        unit.to_string()
    } else {
        format!("{unit}.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter() -> SentenceSegmenter {
        SentenceSegmenter::new().expect("boundary pattern compiles")
    }

    #[test]
    fn splits_on_terminal_punctuation() {
        let units =
            segmenter().segment("The pump failed under load! Maintenance was scheduled twice.");
        // The short opening unit is repeated at the end by design.
        assert_eq!(
            units,
            vec![
                "The pump failed under load!".to_string(),
                "Maintenance was scheduled twice.".to_string(),
                "The pump failed under load!".to_string(),
            ]
        );
    }

    #[test]
    fn abbreviations_do_not_split() {
        let units = segmenter().segment("Dr. Smith approved the design. The review ended there.");
        assert_eq!(units.len(), 3);
        assert!(units[0].starts_with("Dr. Smith"));
        assert_eq!(units[1], "The review ended there.");
    }

    #[test]
    fn decimal_like_tails_do_not_split_in_primary_pass() {
        let units =
            segmenter().segment("The price rose to 3.5. Then it fell. Analysts were surprised.");
        assert_eq!(units.len(), 3);
        assert_eq!(units[0], "The price rose to 3.5. Then it fell.");
        assert_eq!(units[1], "Analysts were surprised.");
    }

    #[test]
    fn bare_period_fallback_keeps_decimals() {
        let text = "Output climbed to 12.5 units per shift across the plant.Throughput held \
                    steady over the quarter.Inspections found no further defects in the line";
        let units = segmenter().segment(text);
        assert!(units.len() > 1);
        assert!(units[0].contains("12.5"));
    }

    #[test]
    fn word_chunk_fallback_for_long_unpunctuated_text() {
        let text = "alpha beta gamma ".repeat(20);
        let units = segmenter().segment(text.trim());
        assert!(units.len() > 1);
        assert!(units.iter().all(|unit| unit.ends_with('.')));
    }

    #[test]
    fn every_unit_is_nonempty_and_terminated() {
        let units = segmenter().segment("no punctuation here");
        assert_eq!(
            units,
            vec![
                "no punctuation here.".to_string(),
                "no punctuation here.".to_string(),
            ]
        );
    }

    #[test]
    fn short_first_unit_is_repeated_at_the_end() {
        let units = segmenter().segment("Quarterly Report. Revenue increased by 12%.");
        assert_eq!(units.len(), 3);
        assert_eq!(units.first(), units.last());
        assert_eq!(units[0], "Quarterly Report.");
    }

    #[test]
    fn empty_input_yields_no_units() {
        assert!(segmenter().segment("").is_empty());
    }
}
