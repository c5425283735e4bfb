use std::fmt;
use std::time::Duration;
use async_trait::async_trait;
use reqwest::{Client, Response};
use url::Url;
use ce_core::{Error, GenerativeModel, ModelDescriptor, ModelReference, Result};
use super::{ApiErrorResponse, GenerateRequest, GenerateResponse, ListModelsResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Google Generative Language REST client.
pub struct GeminiModel {
    client: Client,
    api_key: String,
    base_url: String,
}

impl fmt::Debug for GeminiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiModel")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiModel {
    pub fn new(api_key: &str, base_url: &str) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Inference("Gemini API key is required".to_string()));
        }
        Url::parse(base_url)?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn generate_url(&self, model: &ModelReference) -> String {
        let name = model.as_str();
        if name.starts_with("models/") {
            format!("{}/{}:generateContent", self.base_url, name)
        } else {
            format!("{}/models/{}:generateContent", self.base_url, name)
        }
    }

    /// Turn a non-2xx response into an error carrying the provider's message.
    async fn api_error(response: Response) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        Error::Inference(format!("Gemini API error {}: {}", status, message))
    }
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let list = response.json::<ListModelsResponse>().await?;
        Ok(list.models)
    }

    async fn generate(&self, model: &ModelReference, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(self.generate_url(model))
            .query(&[("key", self.api_key.as_str())])
            .json(&GenerateRequest::from_prompt(prompt))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        response
            .json::<GenerateResponse>()
            .await?
            .first_text()
            .ok_or_else(|| Error::Inference("Gemini response has no candidate text".to_string()))
    }
}
