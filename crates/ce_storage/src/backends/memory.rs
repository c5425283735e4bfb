use async_trait::async_trait;
use ce_core::{Article, ArticleStore, ArticleUpdate, Error, Result};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    articles: Vec<Article>,
    updates: Vec<(u64, ArticleUpdate)>,
    offline: bool,
    failing_updates: HashSet<u64>,
}

impl MemoryStore {
    pub fn new(articles: Vec<Article>) -> Self {
        Self {
            articles,
            ..Default::default()
        }
    }

    pub fn fetch_articles(&self) -> Result<Vec<Article>> {
        if self.offline {
            return Err(Error::Storage("memory store is offline".to_string()));
        }
        Ok(self.articles.clone())
    }

    pub fn update_article(&mut self, id: u64, update: &ArticleUpdate) -> Result<()> {
        if self.offline || self.failing_updates.contains(&id) {
            return Err(Error::Storage(format!("update of article {} rejected", id)));
        }
        let article = self
            .articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::Storage(format!("Article not found: {}", id)))?;
        article.updated_content = Some(update.updated_content.clone());
        article.reference_links = update.reference_links.clone();
        article.is_processed = update.is_processed;
        self.updates.push((id, update.clone()));
        Ok(())
    }
}

/// In-process store. Every accepted update is recorded so callers can inspect
/// exactly what would have been written.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new(articles: Vec<Article>) -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore::new(articles))),
        }
    }

    /// Load a JSON array of articles, shaped like the API's listing. Used for
    /// dry runs: updates are logged and kept in memory only.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let articles: Vec<Article> = serde_json::from_str(&raw)?;
        tracing::info!("📂 Loaded {} articles from {}", articles.len(), path.display());
        Ok(Self::new(articles))
    }

    /// Make every call fail, as an unreachable API would.
    pub async fn set_offline(&self, offline: bool) {
        self.store.write().await.offline = offline;
    }

    /// Reject updates for one article id.
    pub async fn fail_updates_for(&self, id: u64) {
        self.store.write().await.failing_updates.insert(id);
    }

    pub async fn updates(&self) -> Vec<(u64, ArticleUpdate)> {
        self.store.read().await.updates.clone()
    }

    pub async fn article(&self, id: u64) -> Option<Article> {
        self.store.read().await.articles.iter().find(|a| a.id == id).cloned()
    }
}

#[async_trait]
impl ArticleStore for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_articles(&self) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        store.fetch_articles()
    }

    async fn update_article(&self, id: u64, update: &ArticleUpdate) -> Result<()> {
        let mut store = self.store.write().await;
        store.update_article(id, update)?;
        tracing::info!(
            "💾 (memory) article {} now has {} chars and {} references",
            id,
            update.updated_content.chars().count(),
            update.reference_links.len()
        );
        Ok(())
    }
}
