//! Optional translation of titles and abstracts via the Gemini API.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::time::sleep;

use crate::config::Settings;
use crate::models::Paper;
use crate::utils::{HttpClient, RateLimiter, RetryableError};

const GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";

/// Gemini's free tier allows very few requests per minute; the dedicated
/// limiter keeps translation from tripping it.
const TRANSLATION_REQUESTS_PER_MINUTE: u32 = 8;
const TRANSLATION_MAX_RETRIES: u32 = 1;
/// Extra pause between papers on top of the limiter spacing.
const INTER_PAPER_PAUSE: Duration = Duration::from_millis(2_000);

/// Errors from the translation API.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translation API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("translation network error: {0}")]
    Network(String),

    #[error("translation response had no candidates")]
    EmptyResponse,
}

impl From<reqwest::Error> for TranslateError {
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

impl RetryableError for TranslateError {
    fn retry_status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Translates paper titles and abstracts into the configured language.
///
/// Translation is best effort end to end: without an API key every call
/// passes the original text through, and a failed call leaves that paper
/// untranslated instead of failing the run.
#[derive(Debug)]
pub struct Translator {
    client: HttpClient,
    limiter: RateLimiter,
    api_key: Option<String>,
    target_language: String,
    api_url: String,
}

impl Translator {
    pub fn new(settings: &Settings) -> Result<Self, TranslateError> {
        if settings.gemini_api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY is not set, translation will be skipped");
        }

        Ok(Self {
            client: HttpClient::new()?,
            limiter: RateLimiter::new(TRANSLATION_REQUESTS_PER_MINUTE, TRANSLATION_MAX_RETRIES),
            api_key: settings.gemini_api_key.clone(),
            target_language: settings.target_language.clone(),
            api_url: GEMINI_API_URL.to_string(),
        })
    }

    #[cfg(test)]
    fn for_tests(api_key: Option<&str>, api_url: impl Into<String>) -> Self {
        Self {
            client: HttpClient::new().unwrap(),
            // Wide-open limiter so tests do not wait out the real quota.
            limiter: RateLimiter::new(6_000, 1),
            api_key: api_key.map(str::to_string),
            target_language: "Japanese".to_string(),
            api_url: api_url.into(),
        }
    }

    /// Whether translation requests will actually be made.
    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Translate one text. Disabled translators and empty inputs pass
    /// through unchanged.
    pub async fn translate_text(&self, text: &str) -> Result<String, TranslateError> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let Some(api_key) = &self.api_key else {
            return Ok(text.to_string());
        };

        let prompt = format!(
            "Please translate the following academic text to {}. Keep the translation natural \
             and academic in tone. Only return the translation without any additional text or \
             explanations:\n\n{}",
            self.target_language, text
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });
        let url = format!("{}?key={}", self.api_url, api_key);

        let response: GenerateResponse = self
            .limiter
            .schedule("gemini", || {
                let request = self.client.client().post(&url).json(&body);
                async move {
                    let response = request.send().await?;
                    let status = response.status();
                    if !status.is_success() {
                        return Err(TranslateError::Api {
                            status: status.as_u16(),
                            message: format!("Gemini request failed with status {status}"),
                        });
                    }
                    response.json::<GenerateResponse>().await.map_err(Into::into)
                }
            })
            .await?;

        let translated = response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.trim().to_string())
            .ok_or(TranslateError::EmptyResponse)?;
        Ok(translated)
    }

    /// Translate a paper's title and abstract concurrently. Any failure
    /// falls back to passthrough: the translated fields mirror the
    /// originals for that paper only.
    pub async fn translate_paper(&self, paper: Paper) -> Paper {
        let (title, abstract_text) = tokio::join!(
            self.translate_text(&paper.title),
            self.translate_text(&paper.r#abstract)
        );

        match (title, abstract_text) {
            (Ok(title), Ok(abstract_text)) => Paper {
                translated_title: Some(title),
                translated_abstract: Some(abstract_text),
                ..paper
            },
            (title, abstract_text) => {
                let error = title.err().or(abstract_text.err());
                tracing::warn!(
                    title = %paper.title,
                    error = %error.map(|e| e.to_string()).unwrap_or_default(),
                    "translation failed, falling back to the original text"
                );
                Paper {
                    translated_title: Some(paper.title.clone()),
                    translated_abstract: Some(paper.r#abstract.clone()),
                    ..paper
                }
            }
        }
    }

    /// Translate every paper in order, pausing between papers.
    pub async fn translate_all(&self, papers: Vec<Paper>) -> Vec<Paper> {
        if !self.enabled() {
            tracing::info!(count = papers.len(), "translation disabled, passing papers through");
            return papers
                .into_iter()
                .map(|paper| Paper {
                    translated_title: Some(paper.title.clone()),
                    translated_abstract: Some(paper.r#abstract.clone()),
                    ..paper
                })
                .collect();
        }

        tracing::info!(count = papers.len(), "starting translation");
        let total = papers.len();
        let mut translated = Vec::with_capacity(total);
        for (i, paper) in papers.into_iter().enumerate() {
            tracing::debug!(index = i + 1, total, "translating paper");
            translated.push(self.translate_paper(paper).await);
            if i + 1 < total {
                sleep(INTER_PAPER_PAUSE).await;
            }
        }
        translated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaperBuilder;

    fn paper() -> Paper {
        PaperBuilder::new("Attention Is All You Need")
            .abstract_text("We propose the Transformer.")
            .build()
    }

    #[tokio::test]
    async fn disabled_translator_passes_text_through() {
        let translator = Translator::for_tests(None, "http://unused.invalid");

        assert!(!translator.enabled());
        let text = translator.translate_text("Hello").await.unwrap();
        assert_eq!(text, "Hello");

        let papers = translator.translate_all(vec![paper()]).await;
        assert_eq!(
            papers[0].translated_title.as_deref(),
            Some("Attention Is All You Need")
        );
        assert_eq!(
            papers[0].translated_abstract.as_deref(),
            Some("We propose the Transformer.")
        );
    }

    #[tokio::test]
    async fn empty_text_is_not_sent_to_the_api() {
        let translator = Translator::for_tests(Some("key"), "http://unused.invalid");
        let text = translator.translate_text("   ").await.unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn translates_title_and_abstract() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/generate")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"candidates":[{"content":{"parts":[{"text":" 翻訳されたテキスト "}]}}]}"#,
            )
            .expect(2)
            .create_async()
            .await;

        let translator =
            Translator::for_tests(Some("key"), format!("{}/generate", server.url()));
        let translated = translator.translate_paper(paper()).await;

        assert_eq!(translated.translated_title.as_deref(), Some("翻訳されたテキスト"));
        assert_eq!(
            translated.translated_abstract.as_deref(),
            Some("翻訳されたテキスト")
        );
        // Originals stay untouched.
        assert_eq!(translated.title, "Attention Is All You Need");
    }

    #[tokio::test]
    async fn failed_translation_falls_back_to_the_original_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/generate")
            .match_query(mockito::Matcher::Any)
            .with_status(400)
            .create_async()
            .await;

        let translator =
            Translator::for_tests(Some("key"), format!("{}/generate", server.url()));
        let translated = translator.translate_paper(paper()).await;

        assert_eq!(
            translated.translated_title.as_deref(),
            Some("Attention Is All You Need")
        );
        assert_eq!(
            translated.translated_abstract.as_deref(),
            Some("We propose the Transformer.")
        );
        assert_eq!(translated.title, "Attention Is All You Need");
    }
}
