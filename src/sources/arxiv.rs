//! arXiv source client (Atom API).

use std::sync::Arc;

use async_trait::async_trait;
use feed_rs::parser;
use futures_util::future::join_all;

use crate::config::Settings;
use crate::models::{Paper, PaperBuilder};
use crate::scrape::AbstractScraper;
use crate::sources::{SourceClient, SourceError};
use crate::utils::HttpClient;

const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";

/// arXiv search client.
///
/// Queries the export API for the configured keywords in both the abstract
/// and title fields and parses the Atom feed it returns.
#[derive(Debug)]
pub struct ArxivClient {
    client: HttpClient,
    scraper: Arc<AbstractScraper>,
    search_query: String,
    api_url: String,
}

impl ArxivClient {
    pub fn new(settings: &Settings, scraper: Arc<AbstractScraper>) -> Result<Self, SourceError> {
        let terms = settings.keywords_query();
        let search_query = format!("abs:{terms} OR ti:{terms}");
        tracing::info!(query = %search_query, "arXiv client initialized");

        Ok(Self {
            client: HttpClient::new()?,
            scraper,
            search_query,
            api_url: ARXIV_API_URL.to_string(),
        })
    }

    #[cfg(test)]
    fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    async fn entry_to_paper(&self, entry: &feed_rs::model::Entry) -> Paper {
        let title = entry
            .title
            .as_ref()
            .map(|t| t.content.trim().to_string())
            .unwrap_or_default();
        let authors = entry
            .authors
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let link = entry
            .links
            .iter()
            .find(|l| l.rel.as_deref() == Some("alternate"))
            .map(|l| l.href.clone());
        let published = entry
            .published
            .map(|d| d.to_rfc3339())
            .unwrap_or_default();

        let mut abstract_text = entry
            .summary
            .as_ref()
            .map(|s| s.content.trim().to_string())
            .unwrap_or_default();
        if abstract_text.is_empty() {
            if let Some(link) = &link {
                tracing::debug!(link, "arXiv entry has no summary, scraping landing page");
                abstract_text = self.scraper.scrape_abstract(link).await;
            }
        }

        // The entry id doubles as the paper identifier; arXiv does not
        // return a DOI for most preprints.
        let mut builder = PaperBuilder::new(title)
            .author(authors)
            .publication_date(published)
            .abstract_text(abstract_text)
            .journal("arXiv")
            .doi(entry.id.clone());
        if let Some(link) = link {
            builder = builder.link(link);
        }
        builder.build()
    }
}

#[async_trait]
impl SourceClient for ArxivClient {
    fn name(&self) -> &'static str {
        "arXiv"
    }

    async fn fetch_papers(&self, max_results: usize) -> Result<Vec<Paper>, SourceError> {
        let url = format!(
            "{}?search_query={}&start=0&max_results={}",
            self.api_url,
            urlencoding::encode(&self.search_query),
            max_results
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Api {
                status: status.as_u16(),
                message: format!("arXiv request failed with status {status}"),
            });
        }

        let bytes = response.bytes().await?;
        let feed = parser::parse(bytes.as_ref())
            .map_err(|e| SourceError::Parse(format!("invalid Atom feed: {e}")))?;

        let papers = join_all(feed.entries.iter().map(|entry| self.entry_to_paper(entry))).await;

        tracing::info!(count = papers.len(), "fetched papers from arXiv");
        Ok(papers)
    }
}
