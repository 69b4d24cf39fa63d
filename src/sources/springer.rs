//! Springer Nature source client (Metadata API).

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::Deserialize;

use crate::config::Settings;
use crate::models::{Paper, PaperBuilder};
use crate::scrape::AbstractScraper;
use crate::sources::{SourceClient, SourceError};
use crate::utils::HttpClient;

const SPRINGER_API_URL: &str = "https://api.springernature.com/metadata/json";
const DOI_URL: &str = "https://doi.org";

/// Springer Nature client. Requires an API key.
#[derive(Debug)]
pub struct SpringerClient {
    client: HttpClient,
    scraper: Arc<AbstractScraper>,
    api_key: String,
    search_query: String,
    api_url: String,
    doi_url: String,
}

#[derive(Debug, Deserialize)]
struct SpringerResponse {
    #[serde(default)]
    records: Vec<SpringerRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpringerRecord {
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "abstract", default)]
    abstract_text: Option<String>,
    #[serde(default)]
    publication_date: Option<String>,
    #[serde(default)]
    creators: Vec<Creator>,
    #[serde(default)]
    publication_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Creator {
    #[serde(default)]
    creator: Option<String>,
}

impl SpringerClient {
    pub fn new(settings: &Settings, scraper: Arc<AbstractScraper>) -> Result<Self, SourceError> {
        let api_key = settings
            .springer_api_key
            .clone()
            .ok_or_else(|| SourceError::Config("SPRINGER_API_KEY is not set".to_string()))?;

        let search_query = match &settings.keyword2 {
            Some(keyword2) => format!(
                "(keyword:\"{}\" OR keyword:\"{}\")",
                settings.keyword1, keyword2
            ),
            None => format!("(keyword:\"{}\")", settings.keyword1),
        };
        tracing::info!(query = %search_query, "Springer client initialized");

        Ok(Self {
            client: HttpClient::new()?,
            scraper,
            api_key,
            search_query,
            api_url: SPRINGER_API_URL.to_string(),
            doi_url: DOI_URL.to_string(),
        })
    }

    #[cfg(test)]
    fn with_api_urls(mut self, api_url: impl Into<String>, doi_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self.doi_url = doi_url.into();
        self
    }

    async fn record_to_paper(&self, record: SpringerRecord) -> Paper {
        let link = record
            .doi
            .as_ref()
            .map(|doi| format!("{}/{}", self.doi_url, doi));
        let authors = record
            .creators
            .iter()
            .filter_map(|c| c.creator.as_deref())
            .collect::<Vec<_>>()
            .join(", ");

        let mut abstract_text = record.abstract_text.unwrap_or_default();
        if abstract_text.trim().is_empty() {
            if let Some(link) = &link {
                tracing::debug!(link, "Springer record has no abstract, scraping");
                abstract_text = self.scraper.scrape_abstract(link).await;
            }
        }

        let mut builder = PaperBuilder::new(record.title.unwrap_or_default())
            .author(authors)
            .publication_date(record.publication_date.unwrap_or_default())
            .abstract_text(abstract_text)
            .journal(record.publication_name.unwrap_or_else(|| "Springer".to_string()));
        if let Some(doi) = record.doi {
            builder = builder.doi(doi);
        }
        if let Some(link) = link {
            builder = builder.link(link);
        }
        builder.build()
    }
}

#[async_trait]
impl SourceClient for SpringerClient {
    fn name(&self) -> &'static str {
        "Springer"
    }

    async fn fetch_papers(&self, max_results: usize) -> Result<Vec<Paper>, SourceError> {
        let url = format!(
            "{}?api_key={}&q={}&p={}&s=1",
            self.api_url,
            self.api_key,
            urlencoding::encode(&self.search_query),
            max_results
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Api {
                status: status.as_u16(),
                message: format!("Springer request failed with status {status}"),
            });
        }
        let payload: SpringerResponse = response.json().await?;

        let papers = join_all(
            payload
                .records
                .into_iter()
                .map(|record| self.record_to_paper(record)),
        )
        .await;

        tracing::info!(count = papers.len(), "fetched papers from Springer");
        Ok(papers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            keyword1: "materials".to_string(),
            keyword2: None,
            springer_api_key: Some("sp-key".to_string()),
            pubmed_api_key: None,
            gemini_api_key: None,
            target_language: "Japanese".to_string(),
        }
    }

    fn client(server: &mockito::Server) -> SpringerClient {
        SpringerClient::new(&settings(), Arc::new(AbstractScraper::new().unwrap()))
            .unwrap()
            .with_api_urls(
                format!("{}/metadata/json", server.url()),
                format!("{}/doi", server.url()),
            )
    }

    #[tokio::test]
    async fn maps_records_to_papers() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/metadata/json")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"records":[{
                    "doi": "10.1007/s1",
                    "title": "Alloys at Scale",
                    "abstract": "We melt metals.",
                    "publicationDate": "2024-02-01",
                    "creators": [{"creator": "Meitner, Lise"}, {"creator": "Hahn, Otto"}],
                    "publicationName": "Nature Materials"
                }]}"#,
            )
            .create_async()
            .await;

        let papers = client(&server).fetch_papers(10).await.unwrap();

        assert_eq!(papers.len(), 1);
        let paper = &papers[0];
        assert_eq!(paper.title, "Alloys at Scale");
        assert_eq!(paper.r#abstract, "We melt metals.");
        assert_eq!(paper.author, "Meitner, Lise, Hahn, Otto");
        assert_eq!(paper.journal, "Nature Materials");
        assert_eq!(paper.publication_date, "2024-02-01");
        assert_eq!(paper.doi.as_deref(), Some("10.1007/s1"));
        assert!(paper.link.as_deref().unwrap().ends_with("/doi/10.1007/s1"));
    }

    #[tokio::test]
    async fn scrapes_doi_page_when_abstract_is_missing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/metadata/json")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"records":[{"doi": "10.1007/s2", "title": "Sparse Record"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/doi/10.1007/s2")
            .with_status(200)
            .with_body(
                r#"<html><head>
                     <meta name="description" content="Scraped Springer abstract.">
                   </head><body></body></html>"#,
            )
            .create_async()
            .await;

        let papers = client(&server).fetch_papers(10).await.unwrap();

        assert_eq!(papers[0].r#abstract, "Scraped Springer abstract.");
        assert_eq!(papers[0].journal, "Springer");
    }

    #[tokio::test]
    async fn missing_api_key_is_a_config_error() {
        let mut settings = settings();
        settings.springer_api_key = None;
        let err = SpringerClient::new(&settings, Arc::new(AbstractScraper::new().unwrap()))
            .unwrap_err();
        assert!(matches!(err, SourceError::Config(_)));
    }
}
