use std::fmt;
use std::time::Duration;
use url::Url;
use crate::{Error, Result};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "models/gemini-1.5-flash";
pub const DEFAULT_SEARCH_URL: &str = "https://www.google.com";
pub const DEFAULT_EXCLUDED_DOMAIN: &str = "beyondchats.com";

/// A wait that gets one longer second chance before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub initial: Duration,
    pub extended: Duration,
}

impl WaitPolicy {
    pub const fn new(initial: Duration, extended: Duration) -> Self {
        Self { initial, extended }
    }
}

/// Process-wide settings, built once at startup and handed to every component.
#[derive(Clone)]
pub struct EnhancerConfig {
    pub api_key: String,
    pub storage_url: String,
    pub gemini_base_url: String,
    pub default_model: String,
    pub model_families: Vec<String>,
    pub search_url: String,
    pub excluded_domain: String,
    pub query_suffix: String,
    pub competitor_limit: usize,
    pub extract_char_cap: usize,
    pub original_char_cap: usize,
    pub input_wait: WaitPolicy,
    pub results_wait: WaitPolicy,
    pub extract_timeout: Duration,
    pub article_deadline: Duration,
    pub headless: bool,
}

impl fmt::Debug for EnhancerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnhancerConfig")
            .field("api_key", &"<redacted>")
            .field("storage_url", &self.storage_url)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("default_model", &self.default_model)
            .field("model_families", &self.model_families)
            .field("search_url", &self.search_url)
            .field("excluded_domain", &self.excluded_domain)
            .field("competitor_limit", &self.competitor_limit)
            .field("article_deadline", &self.article_deadline)
            .field("headless", &self.headless)
            .finish_non_exhaustive()
    }
}

impl EnhancerConfig {
    pub fn new(api_key: impl Into<String>, storage_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            storage_url: storage_url.into(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            model_families: vec!["flash".to_string(), "pro".to_string()],
            search_url: DEFAULT_SEARCH_URL.to_string(),
            excluded_domain: DEFAULT_EXCLUDED_DOMAIN.to_string(),
            query_suffix: "blog".to_string(),
            competitor_limit: 2,
            extract_char_cap: 2000,
            original_char_cap: 4000,
            input_wait: WaitPolicy::new(Duration::from_secs(5), Duration::from_secs(60)),
            results_wait: WaitPolicy::new(Duration::from_secs(10), Duration::from_secs(30)),
            extract_timeout: Duration::from_secs(15),
            article_deadline: Duration::from_secs(180),
            headless: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config("GEMINI_API_KEY is required".to_string()));
        }
        if self.storage_url.trim().is_empty() {
            return Err(Error::Config("ARTICLES_API_URL is required".to_string()));
        }
        Url::parse(&self.storage_url)
            .map_err(|e| Error::Config(format!("Invalid storage URL {}: {}", self.storage_url, e)))?;
        Url::parse(&self.search_url)
            .map_err(|e| Error::Config(format!("Invalid search URL {}: {}", self.search_url, e)))?;
        if self.competitor_limit == 0 {
            return Err(Error::Config("competitor limit must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Host of the search engine, e.g. `www.google.com`.
    pub fn search_host(&self) -> Option<String> {
        Url::parse(&self.search_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
    }
}
