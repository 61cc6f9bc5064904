//! Note enrichment: fetch a referenced page and reduce it to clean
//! narrative text.
//!
//! Slides that reference a URL are narrated from the page's *readable*
//! content, not its markup. The bundled [`HttpPageFetcher`] pulls the page,
//! walks the main content region (`<article>`, then `<main>`, then
//! `<body>`), and flattens headings, paragraphs and list items into a
//! markdown-ish plain text the generation stages can digest.
//!
//! Enrichment failure is non-fatal to the slide: the orchestrator falls back
//! to the PlainText chain with the original note text.

use crate::error::SlideError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

static SEL_ARTICLE: Lazy<Selector> = Lazy::new(|| Selector::parse("article").unwrap());
static SEL_MAIN: Lazy<Selector> = Lazy::new(|| Selector::parse("main").unwrap());
static SEL_BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static SEL_CONTENT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1, h2, h3, h4, h5, h6, p, li, pre, blockquote").unwrap());

/// Runs of 3+ newlines collapse to one blank line.
static RE_BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// The page-fetch/reader capability.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return its primary readable content as normalized
    /// text. Fails with [`SlideError::Fetch`] on network errors, non-2xx
    /// responses, or pages with no readable content.
    async fn fetch_and_extract(&self, url: &str) -> Result<String, SlideError>;
}

/// HTTP implementation of [`PageFetcher`] backed by reqwest + scraper.
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    /// Build a fetcher with a per-request timeout.
    pub fn new(timeout_secs: u64) -> Result<Self, SlideError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SlideError::Fetch {
                url: String::new(),
                reason: format!("client construction failed: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_and_extract(&self, url: &str) -> Result<String, SlideError> {
        info!("Enriching note from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SlideError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(SlideError::Fetch {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let html = response.text().await.map_err(|e| SlideError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let text = extract_readable(&html);
        if text.trim().is_empty() {
            return Err(SlideError::Fetch {
                url: url.to_string(),
                reason: "no readable content".to_string(),
            });
        }

        debug!("Extracted {} chars from {}", text.len(), url);
        Ok(text)
    }
}

/// Reduce an HTML document to its readable main content.
///
/// Root selection prefers `<article>`, then `<main>`, then `<body>`;
/// scripts, styles, navigation chrome and the like fall away because only
/// heading/paragraph/list/quote elements are visited.
pub fn extract_readable(html: &str) -> String {
    let doc = Html::parse_document(html);

    let root = doc
        .select(&SEL_ARTICLE)
        .next()
        .or_else(|| doc.select(&SEL_MAIN).next())
        .or_else(|| doc.select(&SEL_BODY).next());

    let Some(root) = root else {
        return String::new();
    };

    let mut out = String::new();
    for el in root.select(&SEL_CONTENT) {
        let name = el.value().name();

        // A <p> inside an <li> would be emitted twice; the <li> line wins.
        if name == "p" && has_list_ancestor(&el) {
            continue;
        }

        let text = el
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            continue;
        }

        match name {
            "h1" => out.push_str(&format!("# {text}\n\n")),
            "h2" => out.push_str(&format!("## {text}\n\n")),
            "h3" | "h4" | "h5" | "h6" => out.push_str(&format!("### {text}\n\n")),
            "li" => out.push_str(&format!("- {text}\n")),
            _ => out.push_str(&format!("{text}\n\n")),
        }
    }

    normalize(&out)
}

/// Collapse runs of 3+ blank lines to exactly one blank line and trim.
pub fn normalize(text: &str) -> String {
    RE_BLANK_RUNS.replace_all(text, "\n\n").trim().to_string()
}

fn has_list_ancestor(el: &ElementRef) -> bool {
    let mut node = el.parent();
    while let Some(n) = node {
        if let Some(parent) = ElementRef::wrap(n) {
            if parent.value().name() == "li" {
                return true;
            }
        }
        node = n.parent();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_article_over_body() {
        let html = r#"
            <html><body>
              <nav><a href="/">Home</a></nav>
              <article><h1>Title</h1><p>Body text.</p></article>
              <footer>© nobody</footer>
            </body></html>"#;
        let text = extract_readable(html);
        assert!(text.contains("# Title"));
        assert!(text.contains("Body text."));
        assert!(!text.contains("Home"));
        assert!(!text.contains("nobody"));
    }

    #[test]
    fn scripts_and_styles_are_dropped() {
        let html = r#"
            <html><body>
              <script>var x = "evil";</script>
              <style>p { color: red }</style>
              <p>Visible prose.</p>
            </body></html>"#;
        let text = extract_readable(html);
        assert!(text.contains("Visible prose."));
        assert!(!text.contains("evil"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn lists_become_dashes_without_duplication() {
        let html = "<body><ul><li><p>first</p></li><li>second</li></ul></body>";
        let text = extract_readable(html);
        assert_eq!(text.matches("first").count(), 1);
        assert!(text.contains("- first"));
        assert!(text.contains("- second"));
    }

    #[test]
    fn blank_runs_collapse_to_one_blank_line() {
        let text = normalize("a\n\n\n\n\nb");
        assert_eq!(text, "a\n\nb");
    }

    #[test]
    fn two_newlines_are_left_alone() {
        assert_eq!(normalize("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn unreadable_document_yields_empty() {
        assert_eq!(extract_readable("<html><head></head></html>"), "");
    }
}
