use async_trait::async_trait;
use std::fmt;
use crate::types::{ModelDescriptor, ModelReference};
use crate::Result;

#[async_trait]
pub trait GenerativeModel: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// List the models visible to the configured API key
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>>;

    /// Send a single prompt and return the first candidate's text
    async fn generate(&self, model: &ModelReference, prompt: &str) -> Result<String>;
}
