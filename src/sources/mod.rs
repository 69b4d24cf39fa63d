//! Source clients for the supported paper APIs.
//!
//! Every client normalizes provider responses into [`Paper`] records and
//! shares one [`SourceError`] type so the pipeline can treat failures
//! uniformly.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Paper;
use crate::utils::RetryableError;

pub mod arxiv;
pub mod crossref;
pub mod mock;
pub mod pubmed;
pub mod semantic;
pub mod springer;

pub use arxiv::ArxivClient;
pub use crossref::CrossRefClient;
pub use pubmed::PubMedClient;
pub use semantic::SemanticScholarClient;
pub use springer::SpringerClient;

/// Errors produced by source clients.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Missing or invalid client configuration, detected before any request.
    #[error("configuration error: {0}")]
    Config(String),

    /// The provider answered with a non-success HTTP status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure: DNS, TLS, timeouts, connection resets.
    #[error("network error: {0}")]
    Network(String),

    /// The provider's payload could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Api {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => Self::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<quick_xml::DeError> for SourceError {
    fn from(err: quick_xml::DeError) -> Self {
        Self::Parse(err.to_string())
    }
}

impl RetryableError for SourceError {
    fn retry_status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A client for one external paper source.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Human-readable source name, used in logs and error reports.
    fn name(&self) -> &'static str;

    /// Fetch up to `max_results` normalized papers matching the configured
    /// keywords.
    async fn fetch_papers(&self, max_results: usize) -> Result<Vec<Paper>, SourceError>;
}
