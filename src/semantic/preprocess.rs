//! Text normalization applied to catalog records before embedding.
//!
//! Prepares product title and description for the embedding model:
//! 1. Strip HTML markup
//! 2. Fill missing values with a placeholder
//! 3. Drop exact duplicate rows
//! 4. Canonicalize text (Unicode NFC, no line breaks, redact URLs/emails/phones)

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::record::{CanonicalRecord, RawRecord, MISSING_FIELD_PLACEHOLDER};

pub const URL_PLACEHOLDER: &str = "<URL>";
pub const EMAIL_PLACEHOLDER: &str = "<EMAIL>";
pub const PHONE_PLACEHOLDER: &str = "<PHONE>";
pub const NUMBER_PLACEHOLDER: &str = "<NUMBER>";

static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:(?:https?|ftp)://|www\.)[^\s<>"']+"#)
        .expect("Failed to compile URL regex")
});

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[\w.+-]+@[\w-]+(?:\.[\w-]+)+\b").expect("Failed to compile email regex")
});

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[ .-]?)?(?:\(\d{2,4}\)[ .-]?|\d{2,4}[ .-])\d{3}[ .-]?\d{4}\b")
        .expect("Failed to compile phone regex")
});

static NUMBER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d+(?:[.,]\d+)*\b").expect("Failed to compile number regex")
});

static LINE_BREAK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r\n|\r|\n").expect("Failed to compile line break regex"));

static WHITESPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Failed to compile whitespace regex"));

/// Knobs for `clean_text`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanOptions {
    /// Replace numeric tokens with `<NUMBER>`. Off by default: product
    /// titles carry model numbers and sizes worth keeping.
    pub redact_numbers: bool,
}

/// Result of normalizing a batch of raw records.
#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    pub records: Vec<CanonicalRecord>,
    pub duplicates_removed: usize,
}

/// Remove HTML tags and decode entities, keeping only text content.
pub fn strip_html(text: &str) -> String {
    if !text.contains('<') && !text.contains('&') {
        return text.to_string();
    }

    let fragment = scraper::Html::parse_fragment(text);
    fragment.root_element().text().collect::<String>()
}

/// Canonicalize free text for embedding.
///
/// Casing, digits and punctuation survive; URLs, emails and phone numbers
/// are replaced with fixed placeholders.
pub fn clean_text(text: &str, opts: CleanOptions) -> String {
    let mut text: String = text.nfc().collect();
    text = LINE_BREAK_REGEX.replace_all(&text, " ").into_owned();
    text = URL_REGEX.replace_all(&text, URL_PLACEHOLDER).into_owned();
    text = EMAIL_REGEX.replace_all(&text, EMAIL_PLACEHOLDER).into_owned();
    text = PHONE_REGEX.replace_all(&text, PHONE_PLACEHOLDER).into_owned();
    if opts.redact_numbers {
        text = NUMBER_REGEX.replace_all(&text, NUMBER_PLACEHOLDER).into_owned();
    }

    WHITESPACE_REGEX.replace_all(&text, " ").trim().to_string()
}

/// Run the full normalization over a batch of raw records.
///
/// Output order follows input order with duplicates removed.
pub fn normalize_records(raw: Vec<RawRecord>, opts: CleanOptions) -> NormalizeOutcome {
    let mut seen = HashSet::new();
    let mut outcome = NormalizeOutcome::default();

    for record in raw {
        let filled = CanonicalRecord {
            title: fill_missing(record.title.as_deref().map(strip_html)),
            description: fill_missing(record.description.as_deref().map(strip_html)),
            url: fill_missing(record.url),
        };

        if !seen.insert(filled.clone()) {
            outcome.duplicates_removed += 1;
            continue;
        }

        outcome.records.push(CanonicalRecord {
            title: fill_missing(Some(clean_text(&filled.title, opts))),
            description: fill_missing(Some(clean_text(&filled.description, opts))),
            url: filled.url,
        });
    }

    outcome
}

fn fill_missing(value: Option<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => MISSING_FIELD_PLACEHOLDER.to_string(),
    }
}
