//! Web page fetch adapter.
//!
//! Fetches a page through a reader endpoint that returns extracted
//! title/content as JSON, then strips leftover markdown links and images
//! so chunking sees clean prose.

use crate::error::{Result, SvarError};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument};

/// An extracted web page.
#[derive(Debug, Clone, Deserialize)]
pub struct WebPage {
    pub title: String,
    pub content: String,
}

/// Trait for web page extraction implementations.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page and return its extracted title and cleaned content.
    async fn fetch(&self, url: &str) -> Result<WebPage>;
}

/// Reader-endpoint web page fetcher.
pub struct WebFetcher {
    http: reqwest::Client,
    base_url: String,
    image_re: Regex,
    link_re: Regex,
    blank_re: Regex,
}

impl WebFetcher {
    /// Create a new web fetcher against the given reader endpoint.
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            image_re: Regex::new(r"!\[[^\]]*\]\([^)]+\)").expect("Invalid regex"),
            link_re: Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("Invalid regex"),
            blank_re: Regex::new(r"\n{3,}").expect("Invalid regex"),
        }
    }

    /// Flatten markdown links to their text, drop images, collapse blank runs.
    fn strip_markup(&self, text: &str) -> String {
        let text = self.image_re.replace_all(text, "");
        let text = self.link_re.replace_all(&text, "$1");
        let text = self.blank_re.replace_all(&text, "\n\n");
        text.trim().to_string()
    }
}

#[async_trait]
impl PageFetcher for WebFetcher {
    /// Fetch and clean a web page through the reader endpoint.
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &str) -> Result<WebPage> {
        let endpoint = format!("{}/{}", self.base_url, url);
        let response = self
            .http
            .get(&endpoint)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SvarError::PageFetch(format!(
                "ページの取得に失敗しました ({})",
                response.status().as_u16()
            )));
        }

        let json: serde_json::Value = response.json().await?;
        let data = json.get("data").unwrap_or(&json);

        let title = data
            .get("title")
            .and_then(|t| t.as_str())
            .unwrap_or(url)
            .to_string();
        let content = data
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(SvarError::PageFetch(
                "ページからテキストを抽出できませんでした".to_string(),
            ));
        }

        let cleaned = self.strip_markup(content);
        debug!("Fetched page '{}' ({} chars)", title, cleaned.len());

        Ok(WebPage {
            title,
            content: cleaned,
        })
    }
}
