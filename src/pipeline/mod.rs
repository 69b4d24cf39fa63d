//! Collection pipeline: runs every configured source through the shared
//! rate limiter and deduplicates the combined results.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::config::Settings;
use crate::models::Paper;
use crate::scrape::AbstractScraper;
use crate::sources::{
    ArxivClient, CrossRefClient, PubMedClient, SemanticScholarClient, SourceClient, SourceError,
    SpringerClient,
};
use crate::utils::{dedupe_by_title, RateLimiter};

pub mod output;

/// Budget for the shared limiter across all sources.
const API_REQUESTS_PER_MINUTE: u32 = 20;
const API_MAX_RETRIES: u32 = 1;
/// Pause after each source, on top of the limiter spacing.
const INTER_SOURCE_PAUSE: Duration = Duration::from_millis(1_000);

/// Runs all source clients in a fixed order and merges their results.
///
/// The order is part of the output contract: deduplication keeps the first
/// occurrence of a title, so earlier sources win collisions.
pub struct Aggregator {
    clients: Vec<Box<dyn SourceClient>>,
    limiter: Arc<RateLimiter>,
    inter_source_pause: Duration,
}

impl Aggregator {
    /// Build the standard pipeline: arXiv, Semantic Scholar, Springer,
    /// PubMed, CrossRef. Sources whose required API key is missing are
    /// skipped with a warning instead of failing the run.
    pub fn from_settings(settings: &Settings) -> Result<Self, SourceError> {
        let scraper = Arc::new(AbstractScraper::new()?);
        let mut clients: Vec<Box<dyn SourceClient>> = Vec::new();

        clients.push(Box::new(ArxivClient::new(settings, Arc::clone(&scraper))?));
        clients.push(Box::new(SemanticScholarClient::new(
            settings,
            Arc::clone(&scraper),
        )?));

        match SpringerClient::new(settings, Arc::clone(&scraper)) {
            Ok(client) => clients.push(Box::new(client)),
            Err(SourceError::Config(msg)) => {
                tracing::warn!(%msg, "Springer client not initialized");
            }
            Err(err) => return Err(err),
        }
        match PubMedClient::new(settings, Arc::clone(&scraper)) {
            Ok(client) => clients.push(Box::new(client)),
            Err(SourceError::Config(msg)) => {
                tracing::warn!(%msg, "PubMed client not initialized");
            }
            Err(err) => return Err(err),
        }

        clients.push(Box::new(CrossRefClient::new(settings, scraper)?));

        Ok(Self::with_clients(clients))
    }

    /// Build a pipeline over an arbitrary client list. Used by tests with
    /// canned sources.
    pub fn with_clients(clients: Vec<Box<dyn SourceClient>>) -> Self {
        Self {
            clients,
            limiter: Arc::new(RateLimiter::new(API_REQUESTS_PER_MINUTE, API_MAX_RETRIES)),
            inter_source_pause: INTER_SOURCE_PAUSE,
        }
    }

    /// Override the pause between sources.
    pub fn inter_source_pause(mut self, pause: Duration) -> Self {
        self.inter_source_pause = pause;
        self
    }

    /// Names of the sources this pipeline will query, in collection order.
    pub fn source_names(&self) -> Vec<&'static str> {
        self.clients.iter().map(|c| c.name()).collect()
    }

    /// Fetch up to `max_results` papers from every source sequentially.
    ///
    /// A failing source is logged and skipped; its papers are simply
    /// absent from the output. The combined list is deduplicated by title.
    pub async fn collect(&self, max_results: usize) -> Vec<Paper> {
        tracing::info!(sources = self.clients.len(), "starting paper collection");
        let mut all_papers = Vec::new();

        for client in &self.clients {
            let source = client.name();
            tracing::info!(source, "fetching papers");

            let result = self
                .limiter
                .schedule(source, || client.fetch_papers(max_results))
                .await;
            match result {
                Ok(papers) => {
                    tracing::info!(source, count = papers.len(), "collected papers");
                    all_papers.extend(papers);
                }
                Err(err) => {
                    tracing::error!(source, error = %err, "failed to collect papers");
                }
            }

            sleep(self.inter_source_pause).await;
        }

        let total = all_papers.len();
        let unique = dedupe_by_title(all_papers);
        tracing::info!(total, unique = unique.len(), "collection finished");
        unique
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaperBuilder;
    use crate::sources::mock::MockClient;

    #[tokio::test]
    async fn failing_source_does_not_abort_collection() {
        let aggregator = Aggregator::with_clients(vec![
            Box::new(MockClient::failing("broken", 500)),
            Box::new(MockClient::with_generated_papers("working", 3)),
        ])
        .inter_source_pause(Duration::ZERO);

        let papers = aggregator.collect(10).await;
        assert_eq!(papers.len(), 3);
    }

    #[tokio::test]
    async fn duplicate_titles_across_sources_keep_the_first_source() {
        let first = MockClient::with_papers(
            "first",
            vec![PaperBuilder::new("Shared Title").journal("first").build()],
        );
        let second = MockClient::with_papers(
            "second",
            vec![
                PaperBuilder::new("shared title").journal("second").build(),
                PaperBuilder::new("Unique Title").journal("second").build(),
            ],
        );

        let aggregator = Aggregator::with_clients(vec![Box::new(first), Box::new(second)])
            .inter_source_pause(Duration::ZERO);
        let papers = aggregator.collect(10).await;

        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].journal, "first");
    }

    #[tokio::test]
    async fn max_results_caps_each_source() {
        let aggregator = Aggregator::with_clients(vec![Box::new(
            MockClient::with_generated_papers("many", 10),
        )])
        .inter_source_pause(Duration::ZERO);

        let papers = aggregator.collect(4).await;
        assert_eq!(papers.len(), 4);
    }
}
