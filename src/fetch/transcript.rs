//! Transcript provider adapter.
//!
//! Wraps the transcript API's video and channel endpoints. Failure reasons
//! are kept distinct because bulk import handles them differently:
//! missing captions skip one item, exhausted credits abort the batch.

use crate::error::{Result, SvarError};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, instrument};
use url::Url;

/// A fetched video transcript.
#[derive(Debug, Clone)]
pub struct TranscriptResult {
    pub video_id: String,
    pub title: String,
    pub transcript: String,
}

/// One video in a channel listing.
#[derive(Debug, Clone)]
pub struct ChannelVideo {
    pub video_id: String,
    pub title: String,
    pub url: String,
}

/// Trait for transcript provider implementations.
#[async_trait::async_trait]
pub trait TranscriptFetcher: Send + Sync {
    /// Fetch one video's captions.
    async fn fetch_transcript(&self, video_url: &str) -> Result<TranscriptResult>;

    /// List a channel's latest videos.
    async fn channel_latest(&self, channel_handle: &str) -> Result<Vec<ChannelVideo>>;

    /// List all of a channel's videos.
    async fn channel_all(&self, channel_handle: &str) -> Result<Vec<ChannelVideo>>;
}

/// Transcript API client.
pub struct TranscriptClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TranscriptClient {
    /// Create a new transcript client.
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl TranscriptFetcher for TranscriptClient {
    /// Fetch one video's captions (costs one credit).
    #[instrument(skip(self), fields(video_url = %video_url))]
    async fn fetch_transcript(&self, video_url: &str) -> Result<TranscriptResult> {
        let response = self
            .http
            .get(format!("{}/youtube/transcript", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[
                ("video_url", video_url),
                ("format", "text"),
                ("include_timestamp", "false"),
                ("send_metadata", "true"),
            ])
            .send()
            .await?;

        match response.status().as_u16() {
            404 => return Err(SvarError::NoCaptions(video_url.to_string())),
            402 => return Err(SvarError::QuotaExhausted),
            s if !response.status().is_success() => {
                return Err(SvarError::Transcript(format!("API error (status {})", s)));
            }
            _ => {}
        }

        let data: serde_json::Value = response.json().await?;

        let title = data
            .pointer("/metadata/title")
            .and_then(|t| t.as_str())
            .unwrap_or(video_url)
            .to_string();
        let transcript = data
            .get("transcript")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();
        let video_id = data
            .get("video_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        if transcript.is_empty() {
            return Err(SvarError::NoCaptions(video_url.to_string()));
        }

        debug!("Fetched transcript for {} ({} chars)", video_id, transcript.len());

        Ok(TranscriptResult {
            video_id,
            title,
            transcript,
        })
    }

    /// List a channel's latest videos (no credit cost).
    #[instrument(skip(self))]
    async fn channel_latest(&self, channel_handle: &str) -> Result<Vec<ChannelVideo>> {
        let response = self
            .http
            .get(format!("{}/youtube/channel/latest", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("channel", channel_handle)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SvarError::Transcript(format!(
                "API error (status {})",
                response.status().as_u16()
            )));
        }

        let data: serde_json::Value = response.json().await?;
        Ok(parse_channel_results(&data))
    }

    /// List all of a channel's videos (one credit per page).
    #[instrument(skip(self))]
    async fn channel_all(&self, channel_handle: &str) -> Result<Vec<ChannelVideo>> {
        let mut videos = Vec::new();
        let mut continuation: Option<String> = None;
        let mut is_first = true;

        loop {
            let mut request = self
                .http
                .get(format!("{}/youtube/channel/videos", self.base_url))
                .bearer_auth(&self.api_key);

            if is_first {
                request = request.query(&[("channel", channel_handle)]);
                is_first = false;
            } else if let Some(token) = &continuation {
                request = request.query(&[("continuation", token.as_str())]);
            } else {
                break;
            }

            let response = request.send().await?;

            match response.status().as_u16() {
                402 => return Err(SvarError::QuotaExhausted),
                s if !response.status().is_success() => {
                    return Err(SvarError::Transcript(format!("API error (status {})", s)));
                }
                _ => {}
            }

            let data: serde_json::Value = response.json().await?;
            videos.extend(parse_channel_results(&data));

            let has_more = data.get("has_more").and_then(|h| h.as_bool()).unwrap_or(false);
            continuation = data
                .get("continuation_token")
                .and_then(|t| t.as_str())
                .map(|t| t.to_string());

            if !has_more || continuation.is_none() {
                break;
            }
        }

        Ok(videos)
    }
}

fn parse_channel_results(data: &serde_json::Value) -> Vec<ChannelVideo> {
    data.get("results")
        .and_then(|r| r.as_array())
        .map(|results| {
            results
                .iter()
                .filter_map(|v| {
                    let video_id = v.get("videoId").and_then(|id| id.as_str())?;
                    let title = v.get("title").and_then(|t| t.as_str()).unwrap_or_default();
                    Some(ChannelVideo {
                        video_id: video_id.to_string(),
                        title: title.to_string(),
                        url: canonical_video_url(video_id),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Canonical watch URL for a video ID (bulk-import dedupe key).
pub fn canonical_video_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Extract a video ID from a URL or bare 11-character ID.
///
/// Accepts watch?v=, youtu.be, shorts and embed forms.
pub fn extract_video_id(input: &str) -> Option<String> {
    static ID_RE: OnceLock<Regex> = OnceLock::new();
    let id_re = ID_RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").expect("Invalid regex"));

    let input = input.trim();
    if id_re.is_match(input) {
        return Some(input.to_string());
    }

    let url = Url::parse(input).ok()?;

    if let Some(v) = url.query_pairs().find(|(k, _)| k == "v").map(|(_, v)| v.to_string()) {
        if id_re.is_match(&v) {
            return Some(v);
        }
    }

    if url.host_str() == Some("youtu.be") {
        let id = url.path().trim_start_matches('/');
        if id_re.is_match(id) {
            return Some(id.to_string());
        }
    }

    for prefix in ["/shorts/", "/embed/"] {
        if let Some(rest) = url.path().strip_prefix(prefix) {
            let id = rest.split('/').next().unwrap_or_default();
            if id_re.is_match(id) {
                return Some(id.to_string());
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/shorts/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            extract_video_id("dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );

        assert_eq!(extract_video_id("not-a-video-id"), None);
        assert_eq!(extract_video_id(""), None);
        assert_eq!(extract_video_id("https://example.com/watch?v=short"), None);
    }

    #[test]
    fn test_canonical_url() {
        assert_eq!(
            canonical_video_url("dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_parse_channel_results() {
        let data = serde_json::json!({
            "results": [
                {"videoId": "aaaaaaaaaaa", "title": "動画1"},
                {"videoId": "bbbbbbbbbbb", "title": "動画2"},
                {"title": "missing id"}
            ]
        });

        let videos = parse_channel_results(&data);
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].url, "https://www.youtube.com/watch?v=aaaaaaaaaaa");
    }
}
