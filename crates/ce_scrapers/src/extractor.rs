use std::time::Duration;
use ce_core::types::truncate_chars;
use ce_core::EnhancerConfig;
use crate::browser::WebPage;

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Text(String),
    Failed(String),
}

/// Reads the visible text of one competitor page. One attempt per link.
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    timeout: Duration,
    char_cap: usize,
}

impl ContentExtractor {
    pub fn new(config: &EnhancerConfig) -> Self {
        Self {
            timeout: config.extract_timeout,
            char_cap: config.extract_char_cap,
        }
    }

    pub async fn extract(&self, page: &dyn WebPage, link: &str) -> Extraction {
        if let Err(e) = page.goto(link, self.timeout).await {
            return Extraction::Failed(e.to_string());
        }
        match page.visible_text().await {
            Ok(text) => Extraction::Text(truncate_chars(text.trim(), self.char_cap).to_string()),
            Err(e) => Extraction::Failed(e.to_string()),
        }
    }
}
