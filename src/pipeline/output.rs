//! Writing the collected papers to `papers.json`.

use std::path::Path;

use thiserror::Error;

use crate::models::Paper;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write output file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize papers: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize `papers` as pretty-printed JSON at `path`, replacing any
/// existing file.
pub fn write_papers_json(path: &Path, papers: &[Paper]) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(papers)?;
    std::fs::write(path, json)?;
    tracing::info!(path = %path.display(), count = papers.len(), "wrote papers file");
    Ok(())
}
