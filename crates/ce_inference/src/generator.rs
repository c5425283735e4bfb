use std::sync::Arc;
use ce_core::{CompetitorDigest, EnhancerConfig, GenerationResult, GenerativeModel, ModelReference};
use crate::prompt::{build_prompt, strip_code_fence};

/// Asks the model for a rewritten article. Errors never escape: every failure
/// becomes `GenerationResult::Failed`.
pub struct RewriteGenerator {
    model: Arc<dyn GenerativeModel>,
    original_cap: usize,
}

impl RewriteGenerator {
    pub fn new(model: Arc<dyn GenerativeModel>, config: &EnhancerConfig) -> Self {
        Self {
            model,
            original_cap: config.original_char_cap,
        }
    }

    pub async fn generate(
        &self,
        model: &ModelReference,
        title: &str,
        original: Option<&str>,
        digest: &CompetitorDigest,
    ) -> GenerationResult {
        let prompt = build_prompt(title, original, &digest.render(), self.original_cap);
        tracing::debug!("Prompt for {:?} is {} chars", title, prompt.chars().count());

        match self.model.generate(model, &prompt).await {
            Ok(text) => {
                let html = strip_code_fence(&text);
                if html.is_empty() {
                    tracing::error!("{} returned an empty body", self.model.name());
                    GenerationResult::Failed("empty response".to_string())
                } else {
                    GenerationResult::Html(html.to_string())
                }
            }
            Err(e) => {
                tracing::error!("{} API error: {}", self.model.name(), e);
                GenerationResult::Failed(e.to_string())
            }
        }
    }
}
