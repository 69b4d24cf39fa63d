//! CrossRef source client (REST works API).

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::Deserialize;

use crate::config::Settings;
use crate::models::{Paper, PaperBuilder};
use crate::scrape::AbstractScraper;
use crate::sources::{SourceClient, SourceError};
use crate::utils::HttpClient;

const CROSSREF_API_URL: &str = "https://api.crossref.org/works";
const DOI_URL: &str = "https://doi.org";

/// CrossRef client.
///
/// CrossRef metadata rarely includes abstracts, so every record's DOI
/// link is scraped; the DOI resolver redirects to the publisher page and
/// the scraper picks the matching extraction rules from the final URL.
#[derive(Debug)]
pub struct CrossRefClient {
    client: HttpClient,
    scraper: Arc<AbstractScraper>,
    search_query: String,
    api_url: String,
    doi_url: String,
}

#[derive(Debug, Deserialize)]
struct WorksResponse {
    message: WorksMessage,
}

#[derive(Debug, Deserialize)]
struct WorksMessage {
    #[serde(default)]
    items: Vec<WorkItem>,
}

#[derive(Debug, Deserialize)]
struct WorkItem {
    #[serde(rename = "DOI")]
    doi: String,
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    published: Option<PublishedDate>,
    #[serde(default)]
    author: Vec<WorkAuthor>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PublishedDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
struct WorkAuthor {
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    given: Option<String>,
}

impl WorkAuthor {
    fn display_name(&self) -> String {
        let family = self.family.as_deref().unwrap_or("");
        match self.given.as_deref() {
            Some(given) if !given.is_empty() => format!("{family}, {given}"),
            _ => family.to_string(),
        }
    }
}

impl CrossRefClient {
    pub fn new(settings: &Settings, scraper: Arc<AbstractScraper>) -> Result<Self, SourceError> {
        let search_query = settings.keywords_query();
        tracing::info!(query = %search_query, "CrossRef client initialized");

        Ok(Self {
            client: HttpClient::new()?,
            scraper,
            search_query,
            api_url: CROSSREF_API_URL.to_string(),
            doi_url: DOI_URL.to_string(),
        })
    }

    #[cfg(test)]
    fn with_api_urls(mut self, api_url: impl Into<String>, doi_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self.doi_url = doi_url.into();
        self
    }

    async fn item_to_paper(&self, item: WorkItem) -> Paper {
        let link = format!("{}/{}", self.doi_url, item.doi);
        let published = item
            .published
            .as_ref()
            .and_then(|p| p.date_parts.first())
            .map(|parts| {
                parts
                    .iter()
                    .map(|part| part.to_string())
                    .collect::<Vec<_>>()
                    .join("-")
            })
            .unwrap_or_default();
        let authors = item
            .author
            .iter()
            .map(WorkAuthor::display_name)
            .collect::<Vec<_>>()
            .join(", ");
        let journal = item.container_title.first().cloned().unwrap_or_default();
        let title = item.title.first().cloned().unwrap_or_default();

        let abstract_text = self.scraper.scrape_abstract(&link).await;

        PaperBuilder::new(title)
            .author(authors)
            .publication_date(published)
            .abstract_text(abstract_text)
            .journal(journal)
            .doi(item.doi)
            .link(link)
            .build()
    }
}

#[async_trait]
impl SourceClient for CrossRefClient {
    fn name(&self) -> &'static str {
        "CrossRef"
    }

    async fn fetch_papers(&self, max_results: usize) -> Result<Vec<Paper>, SourceError> {
        let url = format!(
            "{}?query={}&rows={}&sort=published&order=desc",
            self.api_url,
            urlencoding::encode(&self.search_query),
            max_results
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Api {
                status: status.as_u16(),
                message: format!("CrossRef request failed with status {status}"),
            });
        }
        let payload: WorksResponse = response.json().await?;

        let papers = join_all(
            payload
                .message
                .items
                .into_iter()
                .map(|item| self.item_to_paper(item)),
        )
        .await;

        tracing::info!(count = papers.len(), "fetched papers from CrossRef");
        Ok(papers)
    }
}
