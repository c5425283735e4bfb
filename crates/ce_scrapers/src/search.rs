use scraper::{ElementRef, Html, Selector};
use url::Url;
use ce_core::{EnhancerConfig, Result, WaitPolicy};
use crate::browser::WebPage;

pub const QUERY_INPUT: &str = "textarea[name=\"q\"]";
pub const RESULTS_CONTAINER: &str = "#search";

/// Finds competitor articles for a topic through the search engine's web UI.
#[derive(Debug, Clone)]
pub struct SearchHarvester {
    search_url: String,
    engine: String,
    query_suffix: String,
    input_wait: WaitPolicy,
    results_wait: WaitPolicy,
    limit: usize,
}

impl SearchHarvester {
    pub fn new(config: &EnhancerConfig) -> Self {
        Self {
            search_url: config.search_url.clone(),
            engine: config
                .search_host()
                .map(|host| host.trim_start_matches("www.").to_string())
                .unwrap_or_default(),
            query_suffix: config.query_suffix.clone(),
            input_wait: config.input_wait,
            results_wait: config.results_wait,
            limit: config.competitor_limit,
        }
    }

    pub fn query_for(&self, topic: &str, exclude_domain: &str) -> String {
        let mut query = topic.trim().to_string();
        if !self.query_suffix.is_empty() {
            query.push(' ');
            query.push_str(&self.query_suffix);
        }
        if !exclude_domain.is_empty() {
            query.push_str(&format!(" -site:{}", exclude_domain));
        }
        query
    }

    /// Returns up to `limit` result links in page order. Fails only when the
    /// query box or the results never show up.
    pub async fn search(&self, page: &dyn WebPage, topic: &str, exclude_domain: &str) -> Result<Vec<String>> {
        page.goto(&self.search_url, self.input_wait.extended).await?;
        wait_with_retry(page, QUERY_INPUT, self.input_wait).await?;

        page.submit_query(QUERY_INPUT, &self.query_for(topic, exclude_domain)).await?;
        wait_with_retry(page, RESULTS_CONTAINER, self.results_wait).await?;

        let html = page.html().await?;
        let base = page
            .current_url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| self.search_url.clone());

        Ok(extract_result_links(&html, &base, exclude_domain, &self.engine, self.limit))
    }
}

/// Short wait first; slow first paints get one extended attempt.
pub async fn wait_with_retry(page: &dyn WebPage, selector: &str, policy: WaitPolicy) -> Result<()> {
    match page.wait_for(selector, policy.initial).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::debug!("{} not ready ({}), waiting up to {:?}", selector, e, policy.extended);
            page.wait_for(selector, policy.extended).await
        }
    }
}

/// Scan `h3` result headings for their enclosing anchor and keep the first
/// `limit` distinct targets that belong to neither the excluded domain nor the
/// search engine.
pub fn extract_result_links(
    html: &str,
    base: &str,
    exclude_domain: &str,
    engine_domain: &str,
    limit: usize,
) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(heading) = Selector::parse("h3") else {
        return Vec::new();
    };
    let base = Url::parse(base).ok();
    // hosts come back lowercased from Url
    let exclude_domain = exclude_domain.trim().to_ascii_lowercase();

    let mut links: Vec<String> = Vec::new();
    for h3 in document.select(&heading) {
        if links.len() >= limit {
            break;
        }
        let Some(href) = enclosing_href(h3) else {
            continue;
        };
        let Some((target, link)) = resolve_target(href, base.as_ref(), engine_domain) else {
            continue;
        };
        let host = target.host_str().unwrap_or_default();
        if !exclude_domain.is_empty() && host.contains(exclude_domain.as_str()) {
            continue;
        }
        if !engine_domain.is_empty() && host.contains(engine_domain) {
            continue;
        }
        if !links.contains(&link) {
            links.push(link);
        }
    }
    links
}

fn enclosing_href(element: ElementRef<'_>) -> Option<&str> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "a")
        .and_then(|a| a.value().attr("href"))
}

/// Parsed target plus the link as it will be stored. Absolute hrefs are kept
/// verbatim; relative and redirect hrefs are resolved first.
fn resolve_target(href: &str, base: Option<&Url>, engine_domain: &str) -> Option<(Url, String)> {
    let href = href.trim();
    let (url, link) = match Url::parse(href) {
        Ok(url) => (url, href.to_string()),
        Err(_) => {
            let url = base?.join(href).ok()?;
            let link = url.to_string();
            (url, link)
        }
    };
    if !is_web(&url) {
        return None;
    }

    // redirect links such as /url?q=https://target/
    let host = url.host_str().unwrap_or_default();
    if !engine_domain.is_empty() && host.contains(engine_domain) && url.path() == "/url" {
        let target = url
            .query_pairs()
            .find(|(k, _)| k == "q" || k == "url")
            .map(|(_, v)| v.into_owned())?;
        return Url::parse(&target)
            .ok()
            .filter(is_web)
            .map(|u| (u, target));
    }
    Some((url, link))
}

fn is_web(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}
