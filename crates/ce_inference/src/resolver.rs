use std::sync::Arc;
use ce_core::{EnhancerConfig, GenerativeModel, ModelDescriptor, ModelReference};

pub const GENERATE_CONTENT: &str = "generateContent";

/// First model that can generate content and belongs to an accepted family.
pub fn select_model(models: &[ModelDescriptor], families: &[String]) -> Option<ModelReference> {
    models
        .iter()
        .find(|m| {
            m.supports(GENERATE_CONTENT) && families.iter().any(|f| m.name.contains(f.as_str()))
        })
        .map(|m| ModelReference::new(m.name.clone()))
}

/// Picks the model used for a whole run. Never fails: any problem falls back
/// to the configured default.
pub struct ModelResolver {
    model: Arc<dyn GenerativeModel>,
    families: Vec<String>,
    default_model: ModelReference,
}

impl ModelResolver {
    pub fn new(model: Arc<dyn GenerativeModel>, config: &EnhancerConfig) -> Self {
        Self {
            model,
            families: config.model_families.clone(),
            default_model: ModelReference::new(config.default_model.clone()),
        }
    }

    pub async fn resolve(&self) -> ModelReference {
        match self.model.list_models().await {
            Ok(models) => match select_model(&models, &self.families) {
                Some(selected) => {
                    tracing::info!("🧠 Using model: {}", selected);
                    selected
                }
                None => {
                    tracing::warn!(
                        "No listed model matches {:?}, defaulting to {}",
                        self.families,
                        self.default_model
                    );
                    self.default_model.clone()
                }
            },
            Err(e) => {
                tracing::warn!("Could not list models ({}), defaulting to {}", e, self.default_model);
                self.default_model.clone()
            }
        }
    }
}
