use std::fmt;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::timeout;
use uuid::Uuid;
use ce_core::{
    Article, ArticleStore, ArticleUpdate, CompetitorDigest, EnhancerConfig, Error,
    GenerationResult, GenerativeModel, ModelReference, Result,
};
use ce_inference::{ModelResolver, RewriteGenerator};
use crate::browser::{BrowserLauncher, ChromeLauncher, WebPage};
use crate::extractor::{ContentExtractor, Extraction};
use crate::logging::Logger;
use crate::search::SearchHarvester;

/// Where an article is in its enhancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArticleStage {
    Pending,
    Searching,
    Extracting,
    Generating,
    Persisting,
}

impl fmt::Display for ArticleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArticleStage::Pending => "pending",
            ArticleStage::Searching => "searching",
            ArticleStage::Extracting => "extracting",
            ArticleStage::Generating => "generating",
            ArticleStage::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

/// How one article's attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ArticleOutcome {
    /// Generated body and references were stored.
    Enhanced { links: Vec<String> },
    /// Generation failed; the original plus the failure marker was stored.
    Fallback { links: Vec<String>, reason: String },
    /// Nothing was stored; the article stays pending for a later run.
    Skipped { stage: ArticleStage, reason: String },
    /// The update was built but storage rejected it.
    PersistFailed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub model: Option<String>,
    pub fetched: usize,
    pub pending: usize,
    pub enhanced: usize,
    pub fallback: usize,
    pub skipped: usize,
    pub persist_failed: usize,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            model: None,
            fetched: 0,
            pending: 0,
            enhanced: 0,
            fallback: 0,
            skipped: 0,
            persist_failed: 0,
        }
    }

    fn record(&mut self, outcome: &ArticleOutcome) {
        match outcome {
            ArticleOutcome::Enhanced { .. } => self.enhanced += 1,
            ArticleOutcome::Fallback { .. } => self.fallback += 1,
            ArticleOutcome::Skipped { .. } => self.skipped += 1,
            ArticleOutcome::PersistFailed { .. } => self.persist_failed += 1,
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    /// Articles written back to storage in this run.
    pub fn persisted(&self) -> usize {
        self.enhanced + self.fallback
    }
}

/// Per-article state machine. Lives outside the processing future so the
/// stage reached is still known when the deadline cuts it short.
struct ArticleJob<'a> {
    article: &'a Article,
    stage: ArticleStage,
    log: Logger,
}

impl<'a> ArticleJob<'a> {
    fn new(article: &'a Article) -> Self {
        Self {
            article,
            stage: ArticleStage::Pending,
            log: Logger::new().with_prefix(format!("[#{}]", article.id)),
        }
    }

    fn enter(&mut self, stage: ArticleStage) {
        self.log.debug(&format!("{} -> {}", self.stage, stage));
        self.stage = stage;
    }
}

/// Runs one enhancement batch: fetch pending articles, research competitors,
/// rewrite and store.
pub struct EnhancementManager {
    config: EnhancerConfig,
    storage: Arc<dyn ArticleStore>,
    launcher: Arc<dyn BrowserLauncher>,
    resolver: ModelResolver,
    generator: RewriteGenerator,
    harvester: SearchHarvester,
    extractor: ContentExtractor,
}

impl EnhancementManager {
    pub fn new(
        config: EnhancerConfig,
        storage: Arc<dyn ArticleStore>,
        model: Arc<dyn GenerativeModel>,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Self {
        Self {
            resolver: ModelResolver::new(model.clone(), &config),
            generator: RewriteGenerator::new(model, &config),
            harvester: SearchHarvester::new(&config),
            extractor: ContentExtractor::new(&config),
            config,
            storage,
            launcher,
        }
    }

    /// Gemini for generation and a local Chrome for research.
    pub fn from_config(config: EnhancerConfig, storage: Arc<dyn ArticleStore>) -> Result<Self> {
        let model = ce_inference::create_model(&config)?;
        let launcher = Arc::new(ChromeLauncher::new(config.headless));
        Ok(Self::new(config, storage, model, launcher))
    }

    /// Only a failed fetch (or a browser that cannot start) ends the run
    /// early; everything else is handled per article.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::new();
        tracing::info!("🤖 Enhancement run {} started", summary.run_id);

        let articles = self.storage.fetch_articles().await.map_err(|e| {
            Error::Storage(format!(
                "Could not fetch articles from {} ({} store), is the API running? {}",
                self.config.storage_url,
                self.storage.name(),
                e
            ))
        })?;
        summary.fetched = articles.len();

        let pending: Vec<Article> = articles.into_iter().filter(|a| !a.is_processed).collect();
        summary.pending = pending.len();
        tracing::info!("📰 Found {} pending articles", pending.len());

        if pending.is_empty() {
            tracing::info!("✨ No pending articles.");
            return Ok(summary.finish());
        }

        let model = self.resolver.resolve().await;
        summary.model = Some(model.to_string());

        let session = self.launcher.launch().await?;
        for article in &pending {
            let outcome = self.process_article(session.page(), &model, article).await;
            summary.record(&outcome);
        }
        if let Err(e) = session.close().await {
            tracing::warn!("⚠️ Failed to close the browser: {}", e);
        }

        let summary = summary.finish();
        tracing::info!(
            "✅ Done: {} enhanced, {} fallback, {} skipped, {} not saved",
            summary.enhanced,
            summary.fallback,
            summary.skipped,
            summary.persist_failed
        );
        Ok(summary)
    }

    /// Drive one article. Only search and extraction run under the
    /// per-article deadline; generation and persistence are bounded by their
    /// own client timeouts.
    pub async fn process_article(
        &self,
        page: &dyn WebPage,
        model: &ModelReference,
        article: &Article,
    ) -> ArticleOutcome {
        let mut job = ArticleJob::new(article);
        job.log.info(&format!("📰 Processing: \"{}\"", article.title));

        let deadline = self.config.article_deadline;
        let research = timeout(deadline, self.research(&mut job, page)).await;
        let (links, digest) = match research {
            Ok(Ok(found)) => found,
            Ok(Err(outcome)) => return outcome,
            Err(_) => {
                job.log.error(&format!("⏱️ Gave up after {:?} while {}", deadline, job.stage));
                return ArticleOutcome::Skipped {
                    stage: job.stage,
                    reason: format!("deadline of {:?} exceeded", deadline),
                };
            }
        };

        job.enter(ArticleStage::Generating);
        job.log.info(&format!("🧠 Sending to {}...", model));
        let generated = self
            .generator
            .generate(model, &article.title, article.original_content.as_deref(), &digest)
            .await;
        let (update, failure) = match generated {
            GenerationResult::Html(html) => (ArticleUpdate::enhanced(&html, &links), None),
            GenerationResult::Failed(reason) => {
                job.log.warn("AI failed. Saving fallback.");
                (ArticleUpdate::fallback(article.original(), &links), Some(reason))
            }
        };

        job.enter(ArticleStage::Persisting);
        if let Err(e) = self.storage.update_article(article.id, &update).await {
            job.log.error(&format!("Failed to save: {}", e));
            return ArticleOutcome::PersistFailed { reason: e.to_string() };
        }
        job.log.info("💾 Saved!");

        match failure {
            None => ArticleOutcome::Enhanced { links },
            Some(reason) => ArticleOutcome::Fallback { links, reason },
        }
    }

    /// Search, then read each competitor. A failed search ends the attempt.
    async fn research(
        &self,
        job: &mut ArticleJob<'_>,
        page: &dyn WebPage,
    ) -> std::result::Result<(Vec<String>, CompetitorDigest), ArticleOutcome> {
        let article = job.article;
        job.enter(ArticleStage::Searching);
        job.log.info("🔍 Searching for competitors...");
        let links = match self
            .harvester
            .search(page, &article.title, &self.config.excluded_domain)
            .await
        {
            Ok(links) => links,
            Err(e) => {
                if e.is_timeout() {
                    job.log.error(&format!("⏱️ Search page too slow, leaving article pending: {}", e));
                } else {
                    job.log.error(&format!("Search failed, leaving article pending: {}", e));
                }
                return Err(ArticleOutcome::Skipped {
                    stage: ArticleStage::Searching,
                    reason: e.to_string(),
                });
            }
        };
        job.log.info(&format!("🦗 Competitors: {}", links.join(", ")));

        job.enter(ArticleStage::Extracting);
        let digest = self.collect_digest(job, page, &links).await;
        if digest.is_empty() {
            job.log.warn("No competitor content, rewriting from the original alone");
        } else {
            job.log.info(&format!("📄 Read {}/{} competitors", digest.len(), links.len()));
        }
        Ok((links, digest))
    }

    /// Visit each link in order. Failed links are left out of the digest but
    /// stay in the reference list.
    async fn collect_digest(&self, job: &ArticleJob<'_>, page: &dyn WebPage, links: &[String]) -> CompetitorDigest {
        let mut digest = CompetitorDigest::new();
        for link in links {
            match self.extractor.extract(page, link).await {
                Extraction::Text(text) => {
                    job.log.debug(&format!("📄 Read {} chars from {}", text.chars().count(), link));
                    digest.push(link.as_str(), text);
                }
                Extraction::Failed(reason) => {
                    job.log.warn(&format!("⏭️ Skipped {}: {}", link, reason));
                }
            }
        }
        digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use async_trait::async_trait;
    use ce_core::ModelDescriptor;
    use ce_storage::backends::MemoryStorage;
    use crate::search::RESULTS_CONTAINER;
    use crate::test_utils::{FakeLauncher, FakePage};

    const NEW_BODY: &str = "<h2>New</h2><p>better</p>";

    #[derive(Debug)]
    struct MockModel {
        reply: Option<String>,
        delay: Option<Duration>,
        prompts: Mutex<Vec<String>>,
    }

    impl MockModel {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                delay: None,
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                delay: None,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerativeModel for MockModel {
        fn name(&self) -> &str {
            "mock"
        }

        async fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
            Ok(vec![ModelDescriptor {
                name: "models/gemini-1.5-flash".to_string(),
                display_name: None,
                supported_generation_methods: vec!["generateContent".to_string()],
            }])
        }

        async fn generate(&self, _model: &ModelReference, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply
                .clone()
                .ok_or_else(|| Error::Inference("500 Internal error".to_string()))
        }
    }

    fn config() -> EnhancerConfig {
        EnhancerConfig::new("test-key", "http://localhost:8000/api/articles")
    }

    fn article_x() -> Article {
        Article::new(1, "X", "<p>old</p>")
    }

    fn competitor_page() -> FakePage {
        FakePage::new()
            .with_results(&["https://a.com", "https://b.com"])
            .with_text("https://a.com", "Guide A")
            .with_text("https://b.com", "Guide B")
    }

    fn manager(
        config: EnhancerConfig,
        storage: &MemoryStorage,
        model: MockModel,
        launcher: &FakeLauncher,
    ) -> EnhancementManager {
        EnhancementManager::new(
            config,
            Arc::new(storage.clone()),
            Arc::new(model),
            Arc::new(launcher.clone()),
        )
    }

    fn links() -> Vec<String> {
        vec!["https://a.com".to_string(), "https://b.com".to_string()]
    }

    #[tokio::test]
    async fn test_enhanced_article_is_saved_with_references() {
        let storage = MemoryStorage::new(vec![article_x()]);
        let launcher = FakeLauncher::new(competitor_page());
        let manager = manager(config(), &storage, MockModel::replying(NEW_BODY), &launcher);

        let summary = manager.run().await.unwrap();
        assert_eq!(summary.enhanced, 1);
        assert_eq!(summary.model.as_deref(), Some("models/gemini-1.5-flash"));

        let updates = storage.updates().await;
        assert_eq!(updates.len(), 1);
        let (id, update) = &updates[0];
        assert_eq!(*id, 1);
        assert_eq!(
            update.updated_content,
            "<h2>New</h2><p>better</p><h3>References</h3><ul><li><a href=\"https://a.com\">https://a.com</a></li><li><a href=\"https://b.com\">https://b.com</a></li></ul>"
        );
        assert_eq!(update.reference_links, links());
        assert!(update.is_processed);
        assert!(storage.article(1).await.unwrap().is_processed);
    }

    #[tokio::test]
    async fn test_prompt_carries_competitor_text() {
        let storage = MemoryStorage::new(vec![article_x()]);
        let launcher = FakeLauncher::new(competitor_page());
        let model = Arc::new(MockModel::replying(NEW_BODY));
        let manager = EnhancementManager::new(
            config(),
            Arc::new(storage.clone()),
            model.clone(),
            Arc::new(launcher.clone()),
        );

        manager.run().await.unwrap();
        let prompts = model.prompts.lock().unwrap().clone();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("--- Source: https://a.com ---\nGuide A"));
        assert!(prompts[0].contains("--- Source: https://b.com ---\nGuide B"));
        assert!(prompts[0].contains("<p>old</p>"));
    }

    #[tokio::test]
    async fn test_generation_failure_saves_fallback() {
        let storage = MemoryStorage::new(vec![article_x()]);
        let launcher = FakeLauncher::new(competitor_page());
        let manager = manager(config(), &storage, MockModel::failing(), &launcher);

        let summary = manager.run().await.unwrap();
        assert_eq!(summary.fallback, 1);

        let updates = storage.updates().await;
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].1.updated_content,
            "<p>old</p><br><p><em>(AI Enhancement Failed - Check Logs)</em></p>"
        );
        assert!(updates[0].1.is_processed);
    }

    #[tokio::test]
    async fn test_search_timeout_leaves_article_pending() {
        let storage = MemoryStorage::new(vec![article_x()]);
        let launcher = FakeLauncher::new(FakePage::new().missing(RESULTS_CONTAINER));
        let manager = manager(config(), &storage, MockModel::replying(NEW_BODY), &launcher);

        let summary = manager.run().await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert!(storage.updates().await.is_empty());
        assert!(!storage.article(1).await.unwrap().is_processed);
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn test_processed_articles_are_left_alone() {
        let mut done = article_x();
        done.is_processed = true;
        let storage = MemoryStorage::new(vec![done]);
        let launcher = FakeLauncher::new(competitor_page());
        let manager = manager(config(), &storage, MockModel::replying(NEW_BODY), &launcher);

        let summary = manager.run().await.unwrap();
        assert_eq!(summary.fetched, 1);
        assert_eq!(summary.pending, 0);
        assert!(storage.updates().await.is_empty());
        assert_eq!(launcher.launches(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_fatal() {
        let storage = MemoryStorage::new(vec![article_x()]);
        storage.set_offline(true).await;
        let launcher = FakeLauncher::new(competitor_page());
        let manager = manager(config(), &storage, MockModel::replying(NEW_BODY), &launcher);

        let err = manager.run().await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(launcher.launches(), 0);
    }

    #[tokio::test]
    async fn test_persist_failure_moves_on() {
        let storage = MemoryStorage::new(vec![article_x(), Article::new(2, "Y", "<p>two</p>")]);
        storage.fail_updates_for(1).await;
        let launcher = FakeLauncher::new(competitor_page());
        let manager = manager(config(), &storage, MockModel::replying(NEW_BODY), &launcher);

        let summary = manager.run().await.unwrap();
        assert_eq!(summary.persist_failed, 1);
        assert_eq!(summary.enhanced, 1);

        let updates = storage.updates().await;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, 2);
        assert!(!storage.article(1).await.unwrap().is_processed);
    }

    #[tokio::test]
    async fn test_unreadable_competitor_is_still_referenced() {
        let page = FakePage::new()
            .with_results(&["https://a.com", "https://b.com"])
            .with_text("https://a.com", "Guide A")
            .failing("https://b.com");
        let storage = MemoryStorage::new(vec![article_x()]);
        let launcher = FakeLauncher::new(page);
        let model = Arc::new(MockModel::replying(NEW_BODY));
        let manager = EnhancementManager::new(
            config(),
            Arc::new(storage.clone()),
            model.clone(),
            Arc::new(launcher.clone()),
        );

        manager.run().await.unwrap();
        let prompt = model.prompts.lock().unwrap()[0].clone();
        assert!(!prompt.contains("--- Source: https://b.com ---"));

        let updates = storage.updates().await;
        assert_eq!(updates[0].1.reference_links, links());
        assert!(updates[0].1.updated_content.contains("<a href=\"https://b.com\">"));
    }

    #[tokio::test]
    async fn test_deadline_skips_without_saving() {
        let mut config = config();
        config.article_deadline = Duration::from_millis(50);
        let page = FakePage::new()
            .with_results(&["https://a.com", "https://b.com"])
            .with_text("https://a.com", "Guide A")
            .stalled("https://b.com");
        let storage = MemoryStorage::new(vec![article_x()]);
        let launcher = FakeLauncher::new(page);
        let manager = manager(config, &storage, MockModel::replying(NEW_BODY), &launcher);

        let summary = manager.run().await.unwrap();
        assert_eq!(summary.skipped, 1);

        let outcome = manager
            .process_article(launcher.page.as_ref(), &ModelReference::new("models/gemini-1.5-flash"), &article_x())
            .await;
        match outcome {
            ArticleOutcome::Skipped { stage, .. } => assert_eq!(stage, ArticleStage::Extracting),
            other => panic!("unexpected {:?}", other),
        }
        assert!(storage.updates().await.is_empty());
        assert!(!storage.article(1).await.unwrap().is_processed);
    }

    #[tokio::test]
    async fn test_slow_generation_is_not_cut_by_deadline() {
        let mut config = config();
        config.article_deadline = Duration::from_millis(50);
        let model = MockModel {
            delay: Some(Duration::from_millis(200)),
            ..MockModel::replying(NEW_BODY)
        };
        let storage = MemoryStorage::new(vec![article_x()]);
        let launcher = FakeLauncher::new(competitor_page());
        let manager = manager(config, &storage, model, &launcher);

        let summary = manager.run().await.unwrap();
        assert_eq!(summary.enhanced, 1);
        assert_eq!(storage.updates().await.len(), 1);
    }

    #[tokio::test]
    async fn test_no_competitors_still_rewrites() {
        let storage = MemoryStorage::new(vec![article_x()]);
        let launcher = FakeLauncher::new(FakePage::new().with_results(&[]));
        let model = Arc::new(MockModel::replying(NEW_BODY));
        let manager = EnhancementManager::new(
            config(),
            Arc::new(storage.clone()),
            model.clone(),
            Arc::new(launcher.clone()),
        );

        let summary = manager.run().await.unwrap();
        assert_eq!(summary.enhanced, 1);

        let prompt = model.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("No competitor content was available."));

        let updates = storage.updates().await;
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].1.updated_content,
            "<h2>New</h2><p>better</p><h3>References</h3><ul></ul>"
        );
        assert!(updates[0].1.reference_links.is_empty());
    }

    #[tokio::test]
    async fn test_second_run_writes_nothing() {
        let storage = MemoryStorage::new(vec![article_x(), Article::new(2, "Y", "<p>two</p>")]);
        let launcher = FakeLauncher::new(competitor_page());
        let manager = manager(config(), &storage, MockModel::replying(NEW_BODY), &launcher);

        let first = manager.run().await.unwrap();
        assert_eq!(first.persisted(), 2);
        let written = storage.updates().await.len();

        let second = manager.run().await.unwrap();
        assert_eq!(second.pending, 0);
        assert_eq!(storage.updates().await.len(), written);
        assert_eq!(launcher.launches(), 1);
    }

    #[tokio::test]
    async fn test_one_browser_for_the_whole_batch() {
        let articles = (1..=3).map(|id| Article::new(id, format!("T{}", id), "<p>x</p>")).collect();
        let storage = MemoryStorage::new(articles);
        let launcher = FakeLauncher::new(competitor_page());
        let manager = manager(config(), &storage, MockModel::replying(NEW_BODY), &launcher);

        let summary = manager.run().await.unwrap();
        assert_eq!(summary.persisted(), 3);
        assert!(storage.updates().await.len() <= summary.pending);
        assert_eq!(launcher.launches(), 1);
        assert_eq!(launcher.closes(), 1);
    }
}
