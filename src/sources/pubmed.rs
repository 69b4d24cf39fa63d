//! PubMed source client (NCBI E-utilities, esearch + efetch XML).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::sleep;

use crate::config::Settings;
use crate::models::{Paper, PaperBuilder};
use crate::scrape::AbstractScraper;
use crate::sources::{SourceClient, SourceError};
use crate::utils::{exponential_delay, HttpClient};

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";
const ARTICLE_URL: &str = "https://pubmed.ncbi.nlm.nih.gov";

/// Publication-date floor baked into every query; PubMed's open-ended
/// range syntax needs an upper bound, "3000" serving as infinity.
const MIN_PUBLICATION_YEAR: &str = "2023";

const RETRY_MAX: u32 = 3;
const RETRY_BASE: Duration = Duration::from_millis(400);
/// Pause between consecutive efetch calls; E-utilities throttle bursts
/// even with an API key.
const DETAIL_FETCH_PAUSE: Duration = Duration::from_millis(500);

/// PubMed client.
///
/// A search returns only PMIDs; each article is then fetched individually
/// as XML. A failed detail fetch yields a placeholder record pointing at
/// the article page rather than dropping the PMID.
#[derive(Debug)]
pub struct PubMedClient {
    client: HttpClient,
    scraper: Arc<AbstractScraper>,
    api_key: String,
    search_query: String,
    esearch_url: String,
    efetch_url: String,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(rename = "IdList", default)]
    id_list: IdList,
}

#[derive(Debug, Default, Deserialize)]
struct IdList {
    #[serde(rename = "Id", default)]
    ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PubmedArticleSet {
    #[serde(rename = "PubmedArticle", default)]
    articles: Vec<PubmedArticle>,
}

#[derive(Debug, Deserialize)]
struct PubmedArticle {
    #[serde(rename = "MedlineCitation")]
    medline: MedlineCitation,
    #[serde(rename = "PubmedData")]
    pubmed_data: Option<PubmedData>,
}

#[derive(Debug, Deserialize)]
struct MedlineCitation {
    #[serde(rename = "Article")]
    article: Option<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(rename = "ArticleTitle")]
    title: Option<String>,
    #[serde(rename = "Abstract")]
    abstract_node: Option<AbstractNode>,
    #[serde(rename = "AuthorList")]
    author_list: Option<AuthorList>,
    #[serde(rename = "Journal")]
    journal: Option<Journal>,
}

#[derive(Debug, Deserialize)]
struct AbstractNode {
    #[serde(rename = "AbstractText", default)]
    sections: Vec<AbstractSection>,
}

#[derive(Debug, Deserialize)]
struct AbstractSection {
    #[serde(rename = "@Label")]
    label: Option<String>,
    #[serde(rename = "$text", default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AuthorList {
    #[serde(rename = "Author", default)]
    authors: Vec<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(rename = "LastName")]
    last_name: Option<String>,
    #[serde(rename = "ForeName")]
    fore_name: Option<String>,
    #[serde(rename = "Initials")]
    initials: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Journal {
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "JournalIssue")]
    issue: Option<JournalIssue>,
}

#[derive(Debug, Deserialize)]
struct JournalIssue {
    #[serde(rename = "PubDate")]
    pub_date: Option<PubDate>,
}

#[derive(Debug, Deserialize)]
struct PubDate {
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "Month")]
    month: Option<String>,
    #[serde(rename = "Day")]
    day: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PubmedData {
    #[serde(rename = "ArticleIdList")]
    id_list: Option<ArticleIdList>,
}

#[derive(Debug, Deserialize)]
struct ArticleIdList {
    #[serde(rename = "ArticleId", default)]
    ids: Vec<ArticleId>,
}

#[derive(Debug, Deserialize)]
struct ArticleId {
    #[serde(rename = "@IdType")]
    id_type: Option<String>,
    #[serde(rename = "$text", default)]
    value: String,
}

impl Author {
    fn display_name(&self) -> String {
        let last = self.last_name.as_deref().unwrap_or("");
        match (self.fore_name.as_deref(), self.initials.as_deref()) {
            (Some(fore), _) if !fore.is_empty() => format!("{last} {fore}"),
            (None | Some(""), Some(initials)) if !initials.is_empty() => {
                format!("{last} {initials}")
            }
            _ => last.to_string(),
        }
    }
}

impl PubMedClient {
    pub fn new(settings: &Settings, scraper: Arc<AbstractScraper>) -> Result<Self, SourceError> {
        let api_key = settings
            .pubmed_api_key
            .clone()
            .ok_or_else(|| SourceError::Config("PUBMED_API_KEY is not set".to_string()))?;

        let terms = match &settings.keyword2 {
            Some(keyword2) => format!(
                "(\"{}\"[Title/Abstract] OR \"{}\"[Title/Abstract])",
                settings.keyword1, keyword2
            ),
            None => format!("(\"{}\"[Title/Abstract])", settings.keyword1),
        };
        let search_query = format!(
            "{terms} AND (\"{MIN_PUBLICATION_YEAR}\"[Date - Publication] : \"3000\"[Date - Publication])"
        );
        tracing::info!(query = %search_query, "PubMed client initialized");

        Ok(Self {
            client: HttpClient::new()?,
            scraper,
            api_key,
            search_query,
            esearch_url: ESEARCH_URL.to_string(),
            efetch_url: EFETCH_URL.to_string(),
        })
    }

    #[cfg(test)]
    fn with_api_urls(mut self, esearch_url: impl Into<String>, efetch_url: impl Into<String>) -> Self {
        self.esearch_url = esearch_url.into();
        self.efetch_url = efetch_url.into();
        self
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<reqwest::Response, SourceError> {
        let mut retry_count = 0u32;
        loop {
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
                        tracing::warn!(?delay, "PubMed rate limited, retrying");
                        sleep(delay).await;
                        retry_count += 1;
                        continue;
                    }
                    return Err(SourceError::Api {
                        status: status.as_u16(),
                        message: format!("PubMed request failed with status {status}"),
                    });
                }
                Err(err) if retry_count < RETRY_MAX => {
                    let delay = exponential_delay(RETRY_BASE, retry_count);
                    tracing::warn!(error = %err, ?delay, "PubMed request failed, retrying");
                    sleep(delay).await;
                    retry_count += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn fetch_article(&self, pmid: &str) -> Result<PubmedArticle, SourceError> {
        let url = format!(
            "{}?db=pubmed&id={}&retmode=xml&api_key={}",
            self.efetch_url, pmid, self.api_key
        );
        let response = self.fetch_with_retry(&url).await?;
        let xml = response.text().await?;
        let set: PubmedArticleSet = quick_xml::de::from_str(&xml)?;
        set.articles
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::Parse(format!("no article data for PMID {pmid}")))
    }

    async fn article_to_paper(&self, pmid: &str, article_set_entry: PubmedArticle) -> Paper {
        let link = format!("{ARTICLE_URL}/{pmid}/");
        let Some(article) = article_set_entry.medline.article else {
            tracing::warn!(pmid, "article node missing, emitting placeholder record");
            return PaperBuilder::new("").link(link).build();
        };

        let mut abstract_text = article
            .abstract_node
            .map(|node| {
                node.sections
                    .iter()
                    .map(|section| match &section.label {
                        Some(label) if !label.is_empty() => {
                            format!("{}: {}", label, section.text)
                        }
                        _ => section.text.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();
        if abstract_text.trim().is_empty() {
            tracing::debug!(pmid, "no abstract in efetch payload, scraping article page");
            abstract_text = self.scraper.scrape_abstract(&link).await;
        }

        let authors = article
            .author_list
            .map(|list| {
                list.authors
                    .iter()
                    .map(Author::display_name)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();

        let (journal, published) = article
            .journal
            .map(|journal| {
                let published = journal
                    .issue
                    .and_then(|issue| issue.pub_date)
                    .map(|date| {
                        let mut out = date.year.unwrap_or_default();
                        if let Some(month) = date.month.filter(|m| !m.is_empty()) {
                            out.push('-');
                            out.push_str(&month);
                        }
                        if let Some(day) = date.day.filter(|d| !d.is_empty()) {
                            out.push('-');
                            out.push_str(&day);
                        }
                        out
                    })
                    .unwrap_or_default();
                (journal.title.unwrap_or_default(), published)
            })
            .unwrap_or_default();

        let doi = article_set_entry
            .pubmed_data
            .and_then(|data| data.id_list)
            .and_then(|list| {
                list.ids
                    .into_iter()
                    .find(|id| id.id_type.as_deref() == Some("doi"))
            })
            .map(|id| id.value);

        let mut builder = PaperBuilder::new(article.title.unwrap_or_default())
            .author(authors)
            .publication_date(published)
            .abstract_text(abstract_text)
            .journal(journal)
            .link(link);
        if let Some(doi) = doi {
            builder = builder.doi(doi);
        }
        builder.build()
    }
}

#[async_trait]
impl SourceClient for PubMedClient {
    fn name(&self) -> &'static str {
        "PubMed"
    }

    async fn fetch_papers(&self, max_results: usize) -> Result<Vec<Paper>, SourceError> {
        let url = format!(
            "{}?db=pubmed&term={}&retmax={}&sort=pubdate&api_key={}",
            self.esearch_url,
            urlencoding::encode(&self.search_query),
            max_results,
            self.api_key
        );

        let response = self.fetch_with_retry(&url).await?;
        let xml = response.text().await?;
        let search: ESearchResult = quick_xml::de::from_str(&xml)?;

        let mut papers = Vec::with_capacity(search.id_list.ids.len());
        for pmid in &search.id_list.ids {
            match self.fetch_article(pmid).await {
                Ok(article) => papers.push(self.article_to_paper(pmid, article).await),
                Err(err) => {
                    tracing::warn!(pmid, error = %err, "failed to fetch article, emitting placeholder");
                    papers.push(
                        PaperBuilder::new("")
                            .link(format!("{ARTICLE_URL}/{pmid}/"))
                            .build(),
                    );
                }
            }
            sleep(DETAIL_FETCH_PAUSE).await;
        }

        tracing::info!(count = papers.len(), "fetched papers from PubMed");
        Ok(papers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NO_ABSTRACT, NO_TITLE};

    fn settings() -> Settings {
        Settings {
            keyword1: "immunotherapy".to_string(),
            keyword2: Some("oncology".to_string()),
            springer_api_key: None,
            pubmed_api_key: Some("pm-key".to_string()),
            gemini_api_key: None,
            target_language: "Japanese".to_string(),
        }
    }

    fn client(server: &mockito::Server) -> PubMedClient {
        PubMedClient::new(&settings(), Arc::new(AbstractScraper::new().unwrap()))
            .unwrap()
            .with_api_urls(
                format!("{}/esearch.fcgi", server.url()),
                format!("{}/efetch.fcgi", server.url()),
            )
    }

    const ESEARCH: &str = r#"<?xml version="1.0"?>
        <eSearchResult>
          <Count>1</Count>
          <IdList><Id>34567890</Id></IdList>
        </eSearchResult>"#;

    const EFETCH: &str = r#"<?xml version="1.0"?>
        <PubmedArticleSet>
          <PubmedArticle>
            <MedlineCitation>
              <Article>
                <Journal>
                  <JournalIssue>
                    <PubDate><Year>2024</Year><Month>Mar</Month><Day>12</Day></PubDate>
                  </JournalIssue>
                  <Title>Journal of Testing</Title>
                </Journal>
                <ArticleTitle>CAR-T in solid tumors</ArticleTitle>
                <Abstract>
                  <AbstractText Label="BACKGROUND">Cells are hard.</AbstractText>
                  <AbstractText Label="RESULTS">They respond.</AbstractText>
                </Abstract>
                <AuthorList>
                  <Author><LastName>Curie</LastName><ForeName>Marie</ForeName></Author>
                  <Author><LastName>Pasteur</LastName><Initials>L</Initials></Author>
                </AuthorList>
              </Article>
            </MedlineCitation>
            <PubmedData>
              <ArticleIdList>
                <ArticleId IdType="pubmed">34567890</ArticleId>
                <ArticleId IdType="doi">10.1000/jt.2024.1</ArticleId>
              </ArticleIdList>
            </PubmedData>
          </PubmedArticle>
        </PubmedArticleSet>"#;

    #[tokio::test]
    async fn searches_then_fetches_article_details() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/esearch.fcgi")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(ESEARCH)
            .create_async()
            .await;
        server
            .mock("GET", "/efetch.fcgi")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(EFETCH)
            .create_async()
            .await;

        let papers = client(&server).fetch_papers(5).await.unwrap();

        assert_eq!(papers.len(), 1);
        let paper = &papers[0];
        assert_eq!(paper.title, "CAR-T in solid tumors");
        assert_eq!(
            paper.r#abstract,
            "BACKGROUND: Cells are hard.\nRESULTS: They respond."
        );
        assert_eq!(paper.author, "Curie Marie, Pasteur L");
        assert_eq!(paper.journal, "Journal of Testing");
        assert_eq!(paper.publication_date, "2024-Mar-12");
        assert_eq!(paper.doi.as_deref(), Some("10.1000/jt.2024.1"));
        assert_eq!(
            paper.link.as_deref(),
            Some("https://pubmed.ncbi.nlm.nih.gov/34567890/")
        );
    }

    #[tokio::test]
    async fn failed_detail_fetch_yields_a_placeholder_record() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/esearch.fcgi")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(ESEARCH)
            .create_async()
            .await;
        server
            .mock("GET", "/efetch.fcgi")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let papers = client(&server).fetch_papers(5).await.unwrap();

        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, NO_TITLE);
        assert_eq!(papers[0].r#abstract, NO_ABSTRACT);
        assert_eq!(
            papers[0].link.as_deref(),
            Some("https://pubmed.ncbi.nlm.nih.gov/34567890/")
        );
    }

    #[tokio::test]
    async fn missing_api_key_is_a_config_error() {
        let mut settings = settings();
        settings.pubmed_api_key = None;
        let err = PubMedClient::new(&settings, Arc::new(AbstractScraper::new().unwrap()))
            .unwrap_err();
        assert!(matches!(err, SourceError::Config(_)));
    }

    #[test]
    fn query_combines_keywords_and_date_floor() {
        let scraper = Arc::new(AbstractScraper::new().unwrap());
        let client = PubMedClient::new(&settings(), scraper).unwrap();
        assert_eq!(
            client.search_query,
            "(\"immunotherapy\"[Title/Abstract] OR \"oncology\"[Title/Abstract]) \
             AND (\"2023\"[Date - Publication] : \"3000\"[Date - Publication])"
        );
    }
}
