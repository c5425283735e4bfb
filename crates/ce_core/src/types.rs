use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Appended to the original content when the rewrite could not be generated.
pub const FALLBACK_MARKER: &str = "<br><p><em>(AI Enhancement Failed - Check Logs)</em></p>";

/// An article as served by the storage API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub original_content: Option<String>,
    #[serde(default)]
    pub updated_content: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub reference_links: Vec<String>,
    #[serde(default)]
    pub is_processed: bool,
    /// Passed through untouched; the API's timestamp format is not relied on.
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Article {
    pub fn new(id: u64, title: impl Into<String>, original_content: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            url: None,
            original_content: Some(original_content.into()),
            updated_content: None,
            reference_links: Vec::new(),
            is_processed: false,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn original(&self) -> &str {
        self.original_content.as_deref().unwrap_or_default()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The fields written back to storage once an article has been attempted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleUpdate {
    pub updated_content: String,
    pub reference_links: Vec<String>,
    pub is_processed: bool,
}

impl ArticleUpdate {
    /// Generated body followed by the references block.
    pub fn enhanced(html: &str, links: &[String]) -> Self {
        Self {
            updated_content: format!("{}{}", html, render_references(links)),
            reference_links: links.to_vec(),
            is_processed: true,
        }
    }

    /// Original body with the failure marker. The article is still marked processed.
    pub fn fallback(original: &str, links: &[String]) -> Self {
        Self {
            updated_content: format!("{}{}", original, FALLBACK_MARKER),
            reference_links: links.to_vec(),
            is_processed: true,
        }
    }
}

/// Renders `<h3>References</h3><ul>..</ul>` with one anchor per link, in order.
pub fn render_references(links: &[String]) -> String {
    let items = links
        .iter()
        .map(|link| {
            format!(
                "<li><a href=\"{}\">{}</a></li>",
                html_escape::encode_double_quoted_attribute(link),
                html_escape::encode_text(link)
            )
        })
        .collect::<String>();
    format!("<h3>References</h3><ul>{}</ul>", items)
}

/// Keeps at most `max` characters. Never splits a UTF-8 sequence.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// One entry of the provider's model listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelDescriptor {
    pub fn supports(&self, method: &str) -> bool {
        self.supported_generation_methods.iter().any(|m| m == method)
    }
}

/// Opaque provider model identifier, e.g. `models/gemini-1.5-flash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelReference(String);

impl ModelReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResult {
    Html(String),
    Failed(String),
}

/// Competitor text gathered for one article, in link order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompetitorDigest {
    entries: Vec<(String, String)>,
}

impl CompetitorDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, link: impl Into<String>, text: impl Into<String>) {
        self.entries.push((link.into(), text.into()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(link, text)| format!("\n--- Source: {} ---\n{}", link, text))
            .collect()
    }
}
