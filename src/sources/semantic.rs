//! Semantic Scholar source client (Graph API search + legacy details API).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures_util::future::join_all;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::config::Settings;
use crate::models::{Paper, PaperBuilder};
use crate::scrape::AbstractScraper;
use crate::sources::{SourceClient, SourceError};
use crate::utils::{exponential_delay, HttpClient};

const SEARCH_API_URL: &str = "https://api.semanticscholar.org/graph/v1/paper/search";
const DETAILS_API_URL: &str = "https://api.semanticscholar.org/v1/paper";
const PAPER_PAGE_URL: &str = "https://www.semanticscholar.org/paper";

/// Semantic Scholar enforces its own unauthenticated quota, tighter than
/// the shared pipeline limiter, so the client spaces its requests locally.
const LOCAL_REQUESTS_PER_MINUTE: u64 = 50;
const RETRY_MAX: u32 = 2;
const RETRY_BASE: Duration = Duration::from_millis(2_000);

/// Semantic Scholar client.
///
/// Search hits carry only ids and titles; a second request per hit fills
/// in abstract, authors, venue and DOI. A failed detail lookup degrades
/// that one record instead of failing the whole fetch.
#[derive(Debug)]
pub struct SemanticScholarClient {
    client: HttpClient,
    scraper: Arc<AbstractScraper>,
    search_query: String,
    search_url: String,
    details_url: String,
    last_request: Mutex<Option<Instant>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchHit {
    paper_id: String,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaperDetails {
    #[serde(rename = "abstract", default)]
    abstract_text: Option<String>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    authors: Vec<DetailAuthor>,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailAuthor {
    #[serde(default)]
    name: Option<String>,
}

impl SemanticScholarClient {
    pub fn new(settings: &Settings, scraper: Arc<AbstractScraper>) -> Result<Self, SourceError> {
        let search_query = settings.keywords_query();
        tracing::info!(query = %search_query, "Semantic Scholar client initialized");

        Ok(Self {
            client: HttpClient::new()?,
            scraper,
            search_query,
            search_url: SEARCH_API_URL.to_string(),
            details_url: DETAILS_API_URL.to_string(),
            last_request: Mutex::new(None),
        })
    }

    #[cfg(test)]
    fn with_api_urls(mut self, search_url: impl Into<String>, details_url: impl Into<String>) -> Self {
        self.search_url = search_url.into();
        self.details_url = details_url.into();
        self
    }

    async fn enforce_local_spacing(&self) {
        let mut last = self.last_request.lock().await;
        let min_gap = Duration::from_millis(60_000 / LOCAL_REQUESTS_PER_MINUTE);
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < min_gap {
                sleep(min_gap - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// GET with local spacing. 429 responses honor `Retry-After` when
    /// present; transport errors retry with plain exponential backoff.
    async fn fetch_with_retry(&self, url: &str) -> Result<reqwest::Response, SourceError> {
        let mut retry_count = 0u32;
        loop {
            self.enforce_local_spacing().await;

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if status.as_u16() == 429 && retry_count < RETRY_MAX {
                        let delay = response
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .map(Duration::from_secs)
                            .unwrap_or_else(|| exponential_delay(RETRY_BASE, retry_count));
                        tracing::warn!(?delay, "Semantic Scholar rate limited, retrying");
                        sleep(delay).await;
                        retry_count += 1;
                        continue;
                    }
                    return Err(SourceError::Api {
                        status: status.as_u16(),
                        message: format!("Semantic Scholar request failed with status {status}"),
                    });
                }
                Err(err) if retry_count < RETRY_MAX => {
                    let delay = exponential_delay(RETRY_BASE, retry_count);
                    tracing::warn!(error = %err, ?delay, "Semantic Scholar request failed, retrying");
                    sleep(delay).await;
                    retry_count += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn fetch_details(&self, paper_id: &str) -> Result<PaperDetails, SourceError> {
        let url = format!("{}/{}", self.details_url, paper_id);
        let response = self.fetch_with_retry(&url).await?;
        Ok(response.json().await?)
    }

    async fn hit_to_paper(&self, hit: SearchHit) -> Paper {
        let details = match self.fetch_details(&hit.paper_id).await {
            Ok(details) => details,
            Err(err) => {
                tracing::warn!(
                    paper_id = %hit.paper_id,
                    error = %err,
                    "failed to fetch Semantic Scholar details, keeping bare search hit"
                );
                PaperDetails::default()
            }
        };

        let link = details
            .url
            .clone()
            .unwrap_or_else(|| format!("{}/{}", PAPER_PAGE_URL, hit.paper_id));
        let published = details
            .year
            .and_then(|year| Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single())
            .map(|d| d.to_rfc3339())
            .unwrap_or_default();
        let authors = details
            .authors
            .iter()
            .filter_map(|a| a.name.as_deref())
            .collect::<Vec<_>>()
            .join(", ");

        let mut abstract_text = details.abstract_text.unwrap_or_default();
        if abstract_text.trim().is_empty() {
            abstract_text = self.scraper.scrape_abstract(&link).await;
        }

        let mut builder = PaperBuilder::new(hit.title.unwrap_or_default())
            .author(authors)
            .publication_date(published)
            .abstract_text(abstract_text)
            .journal(details.venue.unwrap_or_default())
            .link(link);
        if let Some(doi) = details.doi {
            builder = builder.doi(doi);
        }
        builder.build()
    }
}

#[async_trait]
impl SourceClient for SemanticScholarClient {
    fn name(&self) -> &'static str {
        "Semantic Scholar"
    }

    async fn fetch_papers(&self, max_results: usize) -> Result<Vec<Paper>, SourceError> {
        let url = format!(
            "{}?query={}&limit={}&sort=published",
            self.search_url,
            urlencoding::encode(&self.search_query),
            max_results
        );

        let response = self.fetch_with_retry(&url).await?;
        let search: SearchResponse = response.json().await?;

        // Detail fetches run concurrently but the local spacing lock keeps
        // them within the per-minute quota; order is preserved.
        let papers = join_all(search.data.into_iter().map(|hit| self.hit_to_paper(hit))).await;

        tracing::info!(count = papers.len(), "fetched papers from Semantic Scholar");
        Ok(papers)
    }
}
