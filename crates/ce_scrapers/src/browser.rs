//! Browser automation seam.
//!
//! The pipeline only talks to [`WebPage`], a single tab that the search
//! harvester and the content extractor take turns driving. [`ChromeLauncher`]
//! backs it with a real Chromium through the DevTools protocol.

use std::fmt::Display;
use std::time::Duration;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use ce_core::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

const LAUNCH_ARGS: [&str; 6] = [
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--user-agent=Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

const STEALTH_JS: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
    window.chrome = { runtime: {} };
"#;

/// One browser tab. Calls must not overlap: the tab has a single current document.
#[async_trait]
pub trait WebPage: Send + Sync {
    /// Navigate and wait for the load to finish, up to `limit`.
    async fn goto(&self, url: &str, limit: Duration) -> Result<()>;

    /// Wait until `selector` matches an element. Fails with `Error::Timeout`.
    async fn wait_for(&self, selector: &str, limit: Duration) -> Result<()>;

    /// Type `text` into the element matching `selector` and press Enter.
    async fn submit_query(&self, selector: &str, text: &str) -> Result<()>;

    /// Serialized DOM of the current document.
    async fn html(&self) -> Result<String>;

    /// Rendered, visible text of the document body.
    async fn visible_text(&self) -> Result<String>;

    async fn current_url(&self) -> Result<Option<String>>;
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    fn page(&self) -> &dyn WebPage;

    async fn close(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

fn browser_err(context: &str, e: impl Display) -> Error {
    Error::Browser(format!("{}: {}", context, e))
}

#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    headless: bool,
}

impl ChromeLauncher {
    pub fn new(headless: bool) -> Self {
        Self { headless }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let mut builder = BrowserConfig::builder()
            .window_size(1366, 900)
            .args(LAUNCH_ARGS);
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| browser_err("Browser config error", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| browser_err("Failed to launch browser", e))?;
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| browser_err("Failed to open page", e))?;
        if let Err(e) = page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_JS))
            .await
        {
            tracing::debug!("Could not install stealth script: {}", e);
        }

        tracing::debug!("Browser launched (headless: {})", self.headless);
        Ok(Box::new(ChromeSession {
            browser,
            page: ChromePage { page },
            handler,
        }))
    }
}

pub struct ChromeSession {
    browser: Browser,
    page: ChromePage,
    handler: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    fn page(&self) -> &dyn WebPage {
        &self.page
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromeSession { mut browser, page, handler } = *self;
        drop(page);
        let closed = browser.close().await;
        if let Err(e) = browser.wait().await {
            tracing::debug!("Browser process did not exit cleanly: {}", e);
        }
        handler.abort();
        closed.map_err(|e| browser_err("Failed to close browser", e))?;
        Ok(())
    }
}

pub struct ChromePage {
    page: Page,
}

#[async_trait]
impl WebPage for ChromePage {
    async fn goto(&self, url: &str, limit: Duration) -> Result<()> {
        match timeout(limit, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(browser_err(&format!("Navigation to {} failed", url), e)),
            Err(_) => Err(Error::Timeout(format!("navigation to {} after {:?}", url, limit))),
        }
    }

    async fn wait_for(&self, selector: &str, limit: Duration) -> Result<()> {
        let deadline = Instant::now() + limit;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if let Ok(Ok(_)) = timeout(remaining, self.page.find_element(selector)).await {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(format!("waiting for {} after {:?}", selector, limit)));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn submit_query(&self, selector: &str, text: &str) -> Result<()> {
        let input = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| browser_err(&format!("No element for {}", selector), e))?;
        input
            .click()
            .await
            .map_err(|e| browser_err("Failed to focus input", e))?
            .type_str(text)
            .await
            .map_err(|e| browser_err("Failed to type query", e))?
            .press_key("Enter")
            .await
            .map_err(|e| browser_err("Failed to submit query", e))?;
        Ok(())
    }

    async fn html(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| browser_err("Failed to read page content", e))
    }

    async fn visible_text(&self) -> Result<String> {
        self.page
            .evaluate("document.body ? document.body.innerText : ''")
            .await
            .map_err(|e| browser_err("Failed to read page text", e))?
            .into_value::<String>()
            .map_err(|e| browser_err("Page text was not a string", e))
    }

    async fn current_url(&self) -> Result<Option<String>> {
        self.page
            .url()
            .await
            .map_err(|e| browser_err("Failed to read page URL", e))
    }
}
