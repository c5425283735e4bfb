use async_trait::async_trait;
use ce_core::{Article, ArticleStore, ArticleUpdate, Error, Result};
use reqwest::{Client, Response};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Client for the article CRUD API: `GET <base>` and `PUT <base>/<id>`.
pub struct HttpStorage {
    client: Client,
    base_url: String,
}

impl fmt::Debug for HttpStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpStorage")
            .field("client", &"<reqwest::Client>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HttpStorage {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Url::parse(base_url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn article_url(&self, id: u64) -> String {
        format!("{}/{}", self.base_url, id)
    }

    async fn check_status(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Storage(format!(
            "{} returned {}: {}",
            what,
            status,
            body.chars().take(200).collect::<String>()
        )))
    }
}

#[async_trait]
impl ArticleStore for HttpStorage {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_articles(&self) -> Result<Vec<Article>> {
        let response = self
            .client
            .get(&self.base_url)
            .header("Accept", "application/json")
            .send()
            .await?;
        let response = Self::check_status(response, &format!("GET {}", self.base_url)).await?;
        let articles = response.json::<Vec<Article>>().await?;
        tracing::debug!("Fetched {} articles from {}", articles.len(), self.base_url);
        Ok(articles)
    }

    async fn update_article(&self, id: u64, update: &ArticleUpdate) -> Result<()> {
        let url = self.article_url(id);
        let response = self
            .client
            .put(&url)
            .header("Accept", "application/json")
            .json(update)
            .send()
            .await?;
        Self::check_status(response, &format!("PUT {}", url)).await?;
        Ok(())
    }
}
