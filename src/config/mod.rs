//! Runtime configuration from environment variables and a local `.env` file.

use std::collections::HashMap;
use std::path::Path;

const DEFAULT_KEYWORD: &str = "machinelearning";
const DEFAULT_TARGET_LANGUAGE: &str = "Japanese";

/// Settings shared by the source clients, the translator and the pipeline.
///
/// API keys prefer the process environment and fall back to `.env`;
/// keywords go the other way around, so editing `.env` overrides whatever
/// stale keyword the environment carries.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Primary search keyword.
    pub keyword1: String,
    /// Optional secondary keyword, OR-combined with the first.
    pub keyword2: Option<String>,
    pub springer_api_key: Option<String>,
    pub pubmed_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    /// Language the translator targets.
    pub target_language: String,
}

impl Settings {
    /// Load settings from the environment and `./.env`.
    pub fn from_env() -> Self {
        Self::load(Path::new(".env"))
    }

    fn load(env_file: &Path) -> Self {
        let file_vars = parse_env_file(env_file);

        let keyword1 = keyword_var("KEYWORD1", &file_vars).unwrap_or_else(|| {
            tracing::debug!("KEYWORD1 not set, using default keyword");
            DEFAULT_KEYWORD.to_string()
        });
        let keyword2 = keyword_var("KEYWORD2", &file_vars);

        Self {
            keyword1,
            keyword2,
            springer_api_key: env_var("SPRINGER_API_KEY", &file_vars),
            pubmed_api_key: env_var("PUBMED_API_KEY", &file_vars),
            gemini_api_key: env_var("GEMINI_API_KEY", &file_vars),
            target_language: env_var("TARGET_LANGUAGE", &file_vars)
                .unwrap_or_else(|| DEFAULT_TARGET_LANGUAGE.to_string()),
        }
    }

    /// Keyword expression shared by the full-text sources, e.g.
    /// `"deep learning" OR "transformers"`.
    pub fn keywords_query(&self) -> String {
        match &self.keyword2 {
            Some(keyword2) => format!("\"{}\" OR \"{}\"", self.keyword1, keyword2),
            None => format!("\"{}\"", self.keyword1),
        }
    }
}

/// Environment first, `.env` file as fallback.
fn env_var(key: &str, file_vars: &HashMap<String, String>) -> Option<String> {
    if let Ok(value) = std::env::var(key) {
        if !value.trim().is_empty() {
            return Some(value);
        }
    }
    file_vars.get(key).cloned()
}

/// `.env` file first, environment as fallback. Keywords are edited in the
/// file far more often than in the environment.
fn keyword_var(key: &str, file_vars: &HashMap<String, String>) -> Option<String> {
    if let Some(value) = file_vars.get(key) {
        tracing::debug!(key, "using keyword from .env file");
        return Some(value.clone());
    }
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

/// Minimal `KEY=VALUE` parser; comments and blank lines are skipped, and
/// empty values are treated as unset.
fn parse_env_file(path: &Path) -> HashMap<String, String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return HashMap::new();
    };

    let mut vars = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim();
            if !value.is_empty() {
                vars.insert(key.trim().to_string(), value.to_string());
            }
        }
    }
    vars
}
