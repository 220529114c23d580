//! Vine source resolution.
//!
//! Vine links are sources, not mirror targets: a post URL has to be
//! resolved to the underlying video file before any conversion can run.
//! The archived posts endpoint carries the direct URL; the page's player
//! meta tag is the fallback.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use super::{extract_id, MirrorError, Result};

const ARCHIVE_URL: &str = "https://archive.vine.co/posts";

static PLAYER_STREAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"twitter:player:stream"\s+content="(?P<url>[^"]+)""#)
        .expect("valid player-stream pattern")
});

#[derive(Debug, Deserialize)]
struct ArchivedPost {
    #[serde(rename = "videoUrl")]
    video_url: Option<String>,
}

/// Resolves vine links to the direct video file behind them.
#[async_trait]
pub trait VineResolver: Send + Sync {
    /// Underlying video URL for a `vine.co/v/...` post link.
    async fn video_url(&self, url: &str) -> Result<String>;

    /// Normalize a `v.cdn.vine.co` URL, which is already a direct file
    /// aside from its tracking query parameters.
    fn cdn_url(&self, url: &str) -> String;
}

pub struct VineClient {
    client: reqwest::Client,
}

impl VineClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn archived_video_url(&self, id: &str) -> Result<Option<String>> {
        let resp = self
            .client
            .get(format!("{}/{}.json", ARCHIVE_URL, id))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        let post: ArchivedPost = resp.json().await?;
        Ok(post.video_url)
    }
}

#[async_trait]
impl VineResolver for VineClient {
    async fn video_url(&self, url: &str) -> Result<String> {
        let id = extract_id(url);

        if let Some(video_url) = self.archived_video_url(id).await? {
            return Ok(video_url);
        }

        debug!(url, "vine archive miss, scraping player meta tag");
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(MirrorError::Api {
                service: "vine",
                status: status.as_u16(),
                message,
            });
        }

        let page = resp.text().await?;
        PLAYER_STREAM_RE
            .captures(&page)
            .and_then(|cap| cap.name("url"))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| MirrorError::Network(format!("no video stream found for {}", url)))
    }

    fn cdn_url(&self, url: &str) -> String {
        match url::Url::parse(url) {
            Ok(mut parsed) => {
                parsed.set_query(None);
                parsed.set_fragment(None);
                parsed.to_string()
            }
            Err(_) => url.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdn_url_strips_tracking_parameters() {
        let client = VineClient::new(reqwest::Client::new());
        assert_eq!(
            client.cdn_url(
                "https://v.cdn.vine.co/r/videos/ABC.mp4?versionId=x&bucket=y"
            ),
            "https://v.cdn.vine.co/r/videos/ABC.mp4"
        );
    }

    #[test]
    fn test_player_stream_pattern() {
        let page = r#"<meta property="twitter:player:stream" content="https://v.cdn.vine.co/r/videos/ABC.mp4">"#;
        let cap = PLAYER_STREAM_RE.captures(page).unwrap();
        assert_eq!(
            cap.name("url").unwrap().as_str(),
            "https://v.cdn.vine.co/r/videos/ABC.mp4"
        );
    }
}
