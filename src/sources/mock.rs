//! In-memory source client for exercising the pipeline in tests.

use async_trait::async_trait;

use crate::models::{Paper, PaperBuilder};
use crate::sources::{SourceClient, SourceError};

/// A canned source: returns a fixed list of papers or a fixed error.
#[derive(Debug, Clone)]
pub struct MockClient {
    name: &'static str,
    papers: Vec<Paper>,
    error_status: Option<u16>,
}

impl MockClient {
    /// A source that returns `papers` on every fetch.
    pub fn with_papers(name: &'static str, papers: Vec<Paper>) -> Self {
        Self {
            name,
            papers,
            error_status: None,
        }
    }

    /// A source that fails every fetch with the given HTTP status.
    pub fn failing(name: &'static str, status: u16) -> Self {
        Self {
            name,
            papers: Vec::new(),
            error_status: Some(status),
        }
    }

    /// Convenience: a source returning `count` distinct papers.
    pub fn with_generated_papers(name: &'static str, count: usize) -> Self {
        let papers = (0..count)
            .map(|i| {
                PaperBuilder::new(format!("{name} paper {i}"))
                    .author("Test Author")
                    .abstract_text(format!("Abstract {i}"))
                    .journal(name)
                    .build()
            })
            .collect();
        Self::with_papers(name, papers)
    }
}

#[async_trait]
impl SourceClient for MockClient {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_papers(&self, max_results: usize) -> Result<Vec<Paper>, SourceError> {
        if let Some(status) = self.error_status {
            return Err(SourceError::Api {
                status,
                message: format!("{} mock failure", self.name),
            });
        }
        Ok(self.papers.iter().take(max_results).cloned().collect())
    }
}
