//! Scripted browser doubles for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use ce_core::{Error, Result};
use crate::browser::{BrowserLauncher, BrowserSession, WebPage};

pub const RESULTS_URL: &str = "https://www.google.com/search";

#[derive(Default)]
struct FakeState {
    current: Option<String>,
    results_html: String,
    texts: HashMap<String, String>,
    failing: HashSet<String>,
    stalled: HashSet<String>,
    missing: HashSet<String>,
    slow: HashSet<String>,
    visits: Vec<String>,
    queries: Vec<String>,
    waits: Vec<(String, Duration)>,
}

/// A tab whose pages, results and failures are scripted up front.
#[derive(Default)]
pub struct FakePage {
    state: Mutex<FakeState>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Links rendered as `<a href=..><h3>..</h3></a>` on the results page.
    pub fn with_results(self, links: &[&str]) -> Self {
        let body = links
            .iter()
            .map(|l| format!("<div class=\"g\"><a href=\"{}\"><h3>{}</h3></a></div>", l, l))
            .collect::<String>();
        self.state.lock().unwrap().results_html =
            format!("<html><body><div id=\"search\">{}</div></body></html>", body);
        self
    }

    pub fn with_text(self, url: &str, text: &str) -> Self {
        self.state.lock().unwrap().texts.insert(url.to_string(), text.to_string());
        self
    }

    /// Navigation to `url` fails.
    pub fn failing(self, url: &str) -> Self {
        self.state.lock().unwrap().failing.insert(url.to_string());
        self
    }

    /// Navigation to `url` never finishes.
    pub fn stalled(self, url: &str) -> Self {
        self.state.lock().unwrap().stalled.insert(url.to_string());
        self
    }

    /// `selector` never appears.
    pub fn missing(self, selector: &str) -> Self {
        self.state.lock().unwrap().missing.insert(selector.to_string());
        self
    }

    /// `selector` misses the first wait and shows up on the next one.
    pub fn slow(self, selector: &str) -> Self {
        self.state.lock().unwrap().slow.insert(selector.to_string());
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.state.lock().unwrap().visits.clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn waits(&self) -> Vec<(String, Duration)> {
        self.state.lock().unwrap().waits.clone()
    }
}

#[async_trait]
impl WebPage for FakePage {
    async fn goto(&self, url: &str, limit: Duration) -> Result<()> {
        let stalled = {
            let mut state = self.state.lock().unwrap();
            state.visits.push(url.to_string());
            if state.failing.contains(url) {
                return Err(Error::Timeout(format!("navigation to {} after {:?}", url, limit)));
            }
            state.current = Some(url.to_string());
            state.stalled.contains(url)
        };
        if stalled {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(())
    }

    async fn wait_for(&self, selector: &str, limit: Duration) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.waits.push((selector.to_string(), limit));
        if state.missing.contains(selector) || state.slow.remove(selector) {
            return Err(Error::Timeout(format!("waiting for {} after {:?}", selector, limit)));
        }
        Ok(())
    }

    async fn submit_query(&self, _selector: &str, text: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(text.to_string());
        state.current = Some(RESULTS_URL.to_string());
        Ok(())
    }

    async fn html(&self) -> Result<String> {
        let state = self.state.lock().unwrap();
        match state.current.as_deref() {
            Some(RESULTS_URL) => Ok(state.results_html.clone()),
            _ => Ok("<html><body></body></html>".to_string()),
        }
    }

    async fn visible_text(&self) -> Result<String> {
        let state = self.state.lock().unwrap();
        Ok(state
            .current
            .as_ref()
            .and_then(|url| state.texts.get(url).cloned())
            .unwrap_or_default())
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.state.lock().unwrap().current.clone())
    }
}

/// Hands out sessions over one shared [`FakePage`] and counts launches and closes.
#[derive(Clone)]
pub struct FakeLauncher {
    pub page: Arc<FakePage>,
    pub launches: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl FakeLauncher {
    pub fn new(page: FakePage) -> Self {
        Self {
            page: Arc::new(page),
            launches: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

struct FakeSession {
    page: Arc<FakePage>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    fn page(&self) -> &dyn WebPage {
        self.page.as_ref()
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            page: self.page.clone(),
            closes: self.closes.clone(),
        }))
    }
}
