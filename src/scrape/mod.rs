//! Abstract recovery by scraping publisher landing pages.
//!
//! Sources frequently return records without an abstract. This module
//! fetches the paper's landing page with a browser-like client and applies
//! per-publisher extraction rules keyed off the post-redirect URL, so DOI
//! links that bounce to a publisher site get that publisher's rules.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::redirect;
use scraper::{Html, Selector};
use tokio::time::sleep;

/// Returned when the page was fetched but no usable abstract was found.
pub const SCRAPE_UNAVAILABLE: &str = "No abstract available from web scraping";
/// Returned when the page could not be fetched at all.
pub const SCRAPE_ERROR: &str = "No abstract available from web scraping - Error occurred";

/// Publisher sites block obvious bot user agents, so the scraper presents
/// itself as a desktop browser.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REDIRECTS: usize = 5;
const FETCH_RETRIES: u32 = 3;
const FETCH_RETRY_DELAY: Duration = Duration::from_millis(2_000);

/// Fetches landing pages and extracts abstracts from their HTML.
///
/// Scraping never fails the pipeline: every outcome is a string, either the
/// extracted abstract or one of the sentinel values above.
#[derive(Debug)]
pub struct AbstractScraper {
    client: reqwest::Client,
    retry_count: u32,
    retry_delay: Duration,
}

impl AbstractScraper {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_policy(FETCH_RETRIES, FETCH_RETRY_DELAY)
    }

    fn with_policy(retry_count: u32, retry_delay: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        Ok(Self {
            client,
            retry_count,
            retry_delay,
        })
    }

    /// Scrape the abstract from `url`, returning a sentinel on any failure.
    pub async fn scrape_abstract(&self, url: &str) -> String {
        match self.fetch_with_retry(url).await {
            Ok((html, final_url)) => {
                tracing::debug!(url = %final_url, "scraping abstract from final URL");
                match extract_abstract(&final_url, &html) {
                    Some(text) => text,
                    None => {
                        tracing::warn!(url = %final_url, "no abstract found on page");
                        SCRAPE_UNAVAILABLE.to_string()
                    }
                }
            }
            Err(err) => {
                tracing::warn!(url, error = %err, "failed to fetch page for scraping");
                SCRAPE_ERROR.to_string()
            }
        }
    }

    /// Fetch `url`, retrying any failure (transport or non-2xx status) a
    /// fixed number of times with a flat delay. Returns the body together
    /// with the post-redirect URL.
    async fn fetch_with_retry(&self, url: &str) -> Result<(String, String), reqwest::Error> {
        let mut attempt = 0u32;
        loop {
            let result = async {
                let response = self.client.get(url).send().await?.error_for_status()?;
                let final_url = response.url().to_string();
                let body = response.text().await?;
                Ok::<_, reqwest::Error>((body, final_url))
            }
            .await;

            match result {
                Ok(fetched) => return Ok(fetched),
                Err(err) if attempt < self.retry_count => {
                    tracing::debug!(url, attempt, error = %err, "page fetch failed, retrying");
                    sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// One per-publisher extraction strategy.
///
/// A `terminal` rule owns its URLs completely: when it matches but extracts
/// nothing, extraction stops without trying the generic meta fallback.
/// Those publishers embed meta descriptions that are navigation boilerplate,
/// not abstracts.
struct ExtractionRule {
    hosts: &'static [&'static str],
    terminal: bool,
    extract: fn(&Html) -> Option<String>,
}

static EXTRACTION_RULES: &[ExtractionRule] = &[
    ExtractionRule {
        hosts: &["sciencedirect.com"],
        terminal: false,
        extract: extract_sciencedirect,
    },
    ExtractionRule {
        hosts: &["arxiv.org"],
        terminal: false,
        extract: extract_arxiv,
    },
    ExtractionRule {
        hosts: &["springer.com", "link.springer.com"],
        terminal: false,
        extract: extract_springer,
    },
    ExtractionRule {
        hosts: &["semanticscholar.org"],
        terminal: false,
        extract: extract_semantic_scholar,
    },
    ExtractionRule {
        hosts: &["pubmed.ncbi.nlm.nih.gov"],
        terminal: true,
        extract: extract_pubmed,
    },
    ExtractionRule {
        hosts: &["scopus.com", "elsevier.com"],
        terminal: true,
        extract: extract_scopus,
    },
    ExtractionRule {
        hosts: &["doi.org"],
        terminal: false,
        extract: extract_doi,
    },
];

/// Extract an abstract from `html`, dispatching on the effective (post
/// redirect) URL. Rules are tried in declaration order; when no rule
/// produces text, generic `<meta>` tags are the last resort.
pub fn extract_abstract(effective_url: &str, html: &str) -> Option<String> {
    let doc = Html::parse_document(html);

    for rule in EXTRACTION_RULES {
        if rule.hosts.iter().any(|host| effective_url.contains(host)) {
            match (rule.extract)(&doc) {
                Some(text) => return Some(text),
                None if rule.terminal => return None,
                None => {}
            }
        }
    }

    for selector in [
        r#"meta[name="description"]"#,
        r#"meta[name="citation_abstract"]"#,
        r#"meta[property="og:description"]"#,
    ] {
        if let Some(content) = meta_content(&doc, selector) {
            return Some(content);
        }
    }

    None
}

fn extract_sciencedirect(doc: &Html) -> Option<String> {
    select_text(
        doc,
        &[
            "section.abstract",
            "div.abstract.author",
            r#"div[class*="abstract"]"#,
            "#abstracts",
            "#abstract_sec",
        ],
    )
    .map(|text| strip_abstract_prefix(&text))
}

fn extract_arxiv(doc: &Html) -> Option<String> {
    select_text(doc, &[".abstract"]).map(|text| text.replacen("Abstract:", "", 1).trim().to_string())
}

fn extract_springer(doc: &Html) -> Option<String> {
    select_text(doc, &[".Abstract", ".c-article-section__content"])
}

fn extract_semantic_scholar(doc: &Html) -> Option<String> {
    select_text(doc, &[".abstract__text"])
}

fn extract_pubmed(doc: &Html) -> Option<String> {
    if let Some(text) = select_text(doc, &["#enc-abstract", ".abstract-content", ".abstract"]) {
        if !looks_like_object_dump(&text) {
            return Some(text);
        }
    }

    if let Some(meta) = meta_content(doc, r#"meta[name="citation_abstract"]"#) {
        if !looks_like_object_dump(&meta) {
            return Some(meta);
        }
    }

    leading_paragraphs(doc).filter(|text| !looks_like_object_dump(text))
}

fn extract_scopus(doc: &Html) -> Option<String> {
    if let Some(text) = select_text(
        doc,
        &[".abstractSection", ".abstract", ".Abstract", ".abstract-content"],
    ) {
        if !looks_like_object_dump(&text) {
            return Some(text);
        }
    }

    for selector in [
        r#"meta[name="citation_abstract"]"#,
        r#"meta[name="description"]"#,
    ] {
        if let Some(meta) = meta_content(doc, selector) {
            if !looks_like_object_dump(&meta) {
                return Some(meta);
            }
        }
    }

    leading_paragraphs(doc).filter(|text| !looks_like_object_dump(text))
}

fn extract_doi(doc: &Html) -> Option<String> {
    select_text(
        doc,
        &[
            ".abstract",
            ".abstract-content",
            r#"[class*="abstract"]"#,
            r#"[id*="abstract"]"#,
        ],
    )
    .map(|text| strip_abstract_prefix(&text))
}

/// First non-empty text content among `selectors`, in order.
fn select_text(doc: &Html, selectors: &[&str]) -> Option<String> {
    for selector in selectors {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(element) = doc.select(&selector).next() {
            let text = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Non-empty `content` attribute of the first element matching `selector`.
fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let content = doc.select(&selector).next()?.value().attr("content")?.trim();
    (!content.is_empty()).then(|| content.to_string())
}

/// First two non-empty lines of the page body, joined into one string.
fn leading_paragraphs(doc: &Html) -> Option<String> {
    let body = Selector::parse("body").ok()?;
    let text = doc.select(&body).next()?.text().collect::<String>();
    let paragraphs: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(2)
        .collect();
    (!paragraphs.is_empty()).then(|| paragraphs.join(" "))
}

/// Strip a leading "Abstract" label from publisher markup.
fn strip_abstract_prefix(text: &str) -> String {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    let prefix = PREFIX.get_or_init(|| Regex::new(r"(?i)^Abstract\s*").expect("hardcoded regex"));
    prefix.replace(text, "").trim().to_string()
}

/// Some pages render serialized objects ("[object Object]") where the
/// abstract should be; reject any candidate mentioning "object".
fn looks_like_object_dump(text: &str) -> bool {
    static OBJECT: OnceLock<Regex> = OnceLock::new();
    let object = OBJECT.get_or_init(|| Regex::new(r"(?i)object").expect("hardcoded regex"));
    object.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sciencedirect_prefers_section_abstract_and_strips_label() {
        let html = r#"
            <html><body>
              <div class="abstract-links">Links</div>
              <section class="abstract">Abstract We study things.</section>
            </body></html>"#;

        let abstract_text =
            extract_abstract("https://www.sciencedirect.com/science/article/pii/S1", html);
        assert_eq!(abstract_text.as_deref(), Some("We study things."));
    }

    #[test]
    fn arxiv_strips_abstract_label() {
        let html = r#"
            <html><body>
              <blockquote class="abstract">Abstract: Transformers are neat.</blockquote>
            </body></html>"#;

        let abstract_text = extract_abstract("https://arxiv.org/abs/2401.00001", html);
        assert_eq!(abstract_text.as_deref(), Some("Transformers are neat."));
    }

    #[test]
    fn springer_falls_back_to_article_section_content() {
        let html = r#"
            <html><body>
              <div class="c-article-section__content">A springer abstract.</div>
            </body></html>"#;

        let abstract_text = extract_abstract("https://link.springer.com/article/10.1/s1", html);
        assert_eq!(abstract_text.as_deref(), Some("A springer abstract."));
    }

    #[test]
    fn semantic_scholar_uses_abstract_text_class() {
        let html = r#"<html><body><div class="abstract__text">SS abstract.</div></body></html>"#;

        let abstract_text = extract_abstract("https://www.semanticscholar.org/paper/x", html);
        assert_eq!(abstract_text.as_deref(), Some("SS abstract."));
    }

    #[test]
    fn pubmed_reads_enc_abstract() {
        let html = r#"
            <html><body>
              <div id="enc-abstract">Background: mice. Results: cheese.</div>
            </body></html>"#;

        let abstract_text = extract_abstract("https://pubmed.ncbi.nlm.nih.gov/12345/", html);
        assert_eq!(
            abstract_text.as_deref(),
            Some("Background: mice. Results: cheese.")
        );
    }

    #[test]
    fn pubmed_rejects_object_dumps_and_uses_citation_meta() {
        let html = r#"
            <html><head>
              <meta name="citation_abstract" content="Real abstract from meta.">
            </head><body>
              <div id="enc-abstract">[object Object]</div>
            </body></html>"#;

        let abstract_text = extract_abstract("https://pubmed.ncbi.nlm.nih.gov/12345/", html);
        assert_eq!(abstract_text.as_deref(), Some("Real abstract from meta."));
    }

    #[test]
    fn pubmed_is_terminal_and_skips_generic_meta() {
        // A matching pubmed URL with nothing extractable must not fall
        // through to the generic description meta.
        let html = r#"
            <html><head>
              <meta name="description" content="PubMed is a search engine.">
            </head><body></body></html>"#;

        let abstract_text = extract_abstract("https://pubmed.ncbi.nlm.nih.gov/12345/", html);
        assert_eq!(abstract_text, None);
    }

    #[test]
    fn pubmed_falls_back_to_leading_body_paragraphs() {
        let html = "<html><body>\nFirst paragraph.\n\nSecond paragraph.\n\nThird.\n</body></html>";

        let abstract_text = extract_abstract("https://pubmed.ncbi.nlm.nih.gov/12345/", html);
        assert_eq!(
            abstract_text.as_deref(),
            Some("First paragraph. Second paragraph.")
        );
    }

    #[test]
    fn scopus_uses_description_meta_when_selectors_miss() {
        let html = r#"
            <html><head>
              <meta name="description" content="Scopus record abstract.">
            </head><body></body></html>"#;

        let abstract_text = extract_abstract("https://www.scopus.com/record/display.uri", html);
        assert_eq!(abstract_text.as_deref(), Some("Scopus record abstract."));
    }

    #[test]
    fn doi_matches_attribute_substring_selectors() {
        let html = r#"
            <html><body>
              <div class="article-abstract-body">Abstract  Resolved via DOI.</div>
            </body></html>"#;

        let abstract_text = extract_abstract("https://doi.org/10.1234/abc", html);
        assert_eq!(abstract_text.as_deref(), Some("Resolved via DOI."));
    }

    #[test]
    fn unknown_host_uses_generic_meta_in_order() {
        let html = r#"
            <html><head>
              <meta property="og:description" content="OG text.">
              <meta name="description" content="Description text.">
            </head><body></body></html>"#;

        let abstract_text = extract_abstract("https://journals.example.org/article/1", html);
        assert_eq!(abstract_text.as_deref(), Some("Description text."));
    }

    #[test]
    fn unknown_host_without_meta_yields_none() {
        let html = "<html><body><p>Nothing useful.</p></body></html>";
        assert_eq!(extract_abstract("https://example.org/x", html), None);
    }

    #[tokio::test]
    async fn scrape_returns_meta_description_from_live_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/paper")
            .with_status(200)
            .with_body(
                r#"<html><head>
                     <meta name="description" content="Served abstract.">
                   </head><body></body></html>"#,
            )
            .create_async()
            .await;

        let scraper = AbstractScraper::with_policy(0, Duration::from_millis(1)).unwrap();
        let result = scraper.scrape_abstract(&format!("{}/paper", server.url())).await;

        mock.assert_async().await;
        assert_eq!(result, "Served abstract.");
    }

    #[tokio::test]
    async fn scrape_reports_unavailable_when_page_has_no_abstract() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/empty")
            .with_status(200)
            .with_body("<html><body><p>Nope.</p></body></html>")
            .create_async()
            .await;

        let scraper = AbstractScraper::with_policy(0, Duration::from_millis(1)).unwrap();
        let result = scraper.scrape_abstract(&format!("{}/empty", server.url())).await;

        assert_eq!(result, SCRAPE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn scrape_retries_failed_fetches_then_reports_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/down")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;

        let scraper = AbstractScraper::with_policy(1, Duration::from_millis(1)).unwrap();
        let result = scraper.scrape_abstract(&format!("{}/down", server.url())).await;

        mock.assert_async().await;
        assert_eq!(result, SCRAPE_ERROR);
    }
}
