use async_trait::async_trait;
use crate::types::{Article, ArticleUpdate};
use crate::Result;

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Short backend name used in log lines
    fn name(&self) -> &str;

    /// Fetch every article, processed or not
    async fn fetch_articles(&self) -> Result<Vec<Article>>;

    /// Write the enhancement result back, keyed by article id
    async fn update_article(&self, id: u64, update: &ArticleUpdate) -> Result<()>;
}
