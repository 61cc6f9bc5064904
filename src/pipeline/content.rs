//! Note classification: decide once, up front, what kind of content a
//! slide's speaker note carries.
//!
//! The tag is computed here and threaded through the rest of the pipeline so
//! no later stage re-inspects the raw string. Classification is pure — no
//! side effects, recomputed per run, never persisted.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// First `http(s)://` token, greedy to the first whitespace.
static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());

/// What a note contains, decided once per slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// Trimmed note is empty. The slide runs no stages, submits no job, and
    /// is left untouched.
    Empty,
    /// Free text with no link; runs the instruction chain.
    PlainText,
    /// Note references a web page; runs the enrich/narrate/question chain.
    /// Only the *first* URL in the note is used; later ones are ignored.
    HasReference(String),
}

impl Classification {
    /// Short tag for log lines and the run report.
    pub fn kind(&self) -> &'static str {
        match self {
            Classification::Empty => "empty",
            Classification::PlainText => "plain-text",
            Classification::HasReference(_) => "has-reference",
        }
    }
}

/// The raw note string plus its classification tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteContent {
    pub raw: String,
    pub classification: Classification,
}

impl NoteContent {
    pub fn is_empty(&self) -> bool {
        self.classification == Classification::Empty
    }
}

/// Classify one slide's raw note text.
///
/// Empty if and only if the trimmed string has length 0. Otherwise the first
/// well-formed `http(s)://` token decides `HasReference`; everything else is
/// `PlainText`.
pub fn classify(raw: &str) -> NoteContent {
    let classification = if raw.trim().is_empty() {
        Classification::Empty
    } else if let Some(m) = RE_URL.find(raw) {
        Classification::HasReference(m.as_str().to_string())
    } else {
        Classification::PlainText
    };

    NoteContent {
        raw: raw.to_string(),
        classification,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_notes_classify_empty() {
        assert_eq!(classify("").classification, Classification::Empty);
        assert_eq!(classify("   \n\t  ").classification, Classification::Empty);
    }

    #[test]
    fn plain_text_without_link() {
        let c = classify("Explain caching.");
        assert_eq!(c.classification, Classification::PlainText);
        assert_eq!(c.raw, "Explain caching.");
    }

    #[test]
    fn first_url_wins() {
        let c = classify("see https://a.example and https://b.example");
        assert_eq!(
            c.classification,
            Classification::HasReference("https://a.example".into())
        );
    }

    #[test]
    fn url_token_is_greedy_to_whitespace() {
        let c = classify("docs: https://docs.example/topic?x=1#frag then more");
        assert_eq!(
            c.classification,
            Classification::HasReference("https://docs.example/topic?x=1#frag".into())
        );
    }

    #[test]
    fn http_scheme_also_matches() {
        let c = classify("http://plain.example/page");
        assert!(matches!(c.classification, Classification::HasReference(_)));
    }

    #[test]
    fn scheme_without_host_is_plain_text() {
        // "https://" alone has no token body after the scheme separator, but
        // the regex requires at least one non-space char — bare scheme with
        // nothing after it does not classify as a reference.
        let c = classify("the https:// prefix by itself");
        assert_eq!(c.classification, Classification::PlainText);
    }
}
