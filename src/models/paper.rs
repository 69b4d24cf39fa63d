//! Paper model: the canonical normalized record for one academic work.

use serde::{Deserialize, Serialize};

/// Placeholder used when a source returns no title for a record.
pub const NO_TITLE: &str = "No title available";
/// Placeholder used when neither the API nor scraping yields an abstract.
pub const NO_ABSTRACT: &str = "No abstract available";
/// Placeholder used when a source returns no publication date.
pub const NO_PUBLICATION_DATE: &str = "No publication date available";
/// Placeholder used when a source returns no venue/journal name.
pub const NO_JOURNAL: &str = "No journal available";

/// A normalized paper record produced by every source client.
///
/// Serialized field names are the camelCase contract consumed by the
/// rendering stage via `papers.json`, so renames here are breaking.
///
/// `title` and `abstract` are never empty: [`PaperBuilder::build`] coerces
/// missing values to the placeholder sentinels above.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    /// Paper title, always a plain non-empty string.
    pub title: String,

    /// Comma-joined author display names; empty string if unknown.
    pub author: String,

    /// Source-native date representation: ISO date, ISO datetime, or a
    /// reconstructed `YYYY[-MM[-DD]]`. Callers must parse defensively.
    pub publication_date: String,

    /// Abstract text; real content, a scraped result, or a sentinel.
    pub r#abstract: String,

    /// Declared venue, or the source's own name when absent.
    pub journal: String,

    /// Provider-specific identifier. Not always a true DOI: arXiv uses its
    /// entry id here.
    pub doi: Option<String>,

    /// Canonical URL to the paper's landing page.
    pub link: Option<String>,

    /// Added by the translator stage; equals `title` when translation is
    /// disabled or failed for this paper.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_title: Option<String>,

    /// Added by the translator stage; equals `abstract` when translation is
    /// disabled or failed for this paper.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_abstract: Option<String>,
}

/// Builder for constructing [`Paper`] records inside source clients.
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    paper: Paper,
}

impl PaperBuilder {
    /// Start a new paper from its title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            paper: Paper {
                title: title.into(),
                author: String::new(),
                publication_date: NO_PUBLICATION_DATE.to_string(),
                r#abstract: String::new(),
                journal: NO_JOURNAL.to_string(),
                doi: None,
                link: None,
                translated_title: None,
                translated_abstract: None,
            },
        }
    }

    /// Set the comma-joined author string.
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.paper.author = author.into();
        self
    }

    /// Set the source-native publication date (empty input keeps the sentinel).
    pub fn publication_date(mut self, date: impl Into<String>) -> Self {
        let date = date.into();
        if !date.is_empty() {
            self.paper.publication_date = date;
        }
        self
    }

    /// Set the abstract text.
    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.paper.r#abstract = abstract_text.into();
        self
    }

    /// Set the venue/journal name (empty input keeps the sentinel).
    pub fn journal(mut self, journal: impl Into<String>) -> Self {
        let journal = journal.into();
        if !journal.is_empty() {
            self.paper.journal = journal;
        }
        self
    }

    /// Set the provider-specific identifier.
    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        self.paper.doi = Some(doi.into());
        self
    }

    /// Set the landing-page URL.
    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.paper.link = Some(link.into());
        self
    }

    /// Finish the record, coercing empty title/abstract to their sentinels.
    pub fn build(mut self) -> Paper {
        if self.paper.title.trim().is_empty() {
            self.paper.title = NO_TITLE.to_string();
        }
        if self.paper.r#abstract.trim().is_empty() {
            self.paper.r#abstract = NO_ABSTRACT.to_string();
        }
        self.paper
    }
}
