//! Streamable client, the short-video mirror host.
//!
//! Import is by source URL under the bot account's basic auth. The API
//! returns protocol-relative file URLs, which are normalized to https
//! before anything downstream sees them.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{Cooldown, MirrorAdapter, MirrorError, Result};
use crate::models::{MediaFormat, MirrorService};

const API_URL: &str = "https://api.streamable.com";

#[derive(Debug, Deserialize)]
struct ImportResponse {
    #[serde(default)]
    shortcode: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VideoInfo {
    #[serde(default)]
    files: BTreeMap<String, VideoFile>,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    #[serde(default)]
    url: Option<String>,
}

/// Prefix protocol-relative URLs the way browsers would resolve them.
fn absolute(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url.to_string()
    }
}

pub struct StreamableClient {
    client: reqwest::Client,
    pacer: Arc<Cooldown>,
    username: String,
    password: String,
}

impl StreamableClient {
    pub fn new(
        client: reqwest::Client,
        pacer: Arc<Cooldown>,
        username: String,
        password: String,
    ) -> Self {
        Self {
            client,
            pacer,
            username,
            password,
        }
    }
}

#[async_trait]
impl MirrorAdapter for StreamableClient {
    fn service(&self) -> MirrorService {
        MirrorService::Streamable
    }

    async fn convert(&self, _title: &str, url: &str) -> Result<Option<String>> {
        self.pacer.wait_for_slot().await;

        let resp = self
            .client
            .get(format!("{}/import", API_URL))
            .basic_auth(&self.username, Some(&self.password))
            .query(&[("url", url)])
            .send()
            .await?;

        let status = resp.status();
        // Unsupported sources come back 422: a decline, not a failure.
        if status.as_u16() == 422 {
            debug!(url, "streamable declined import");
            return Ok(None);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(MirrorError::Api {
                service: "streamable",
                status: status.as_u16(),
                message,
            });
        }

        let imported: ImportResponse = resp.json().await?;
        Ok(imported
            .shortcode
            .map(|code| format!("https://streamable.com/{}", code)))
    }

    async fn fetch_formats(&self, id: &str) -> Result<Vec<MediaFormat>> {
        self.pacer.wait_for_slot().await;

        let resp = self
            .client
            .get(format!("{}/videos/{}", API_URL, id))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(MirrorError::Api {
                service: "streamable",
                status: status.as_u16(),
                message,
            });
        }

        let info: VideoInfo = resp.json().await?;
        let formats = info
            .files
            .into_iter()
            .filter_map(|(label, file)| {
                file.url.map(|url| MediaFormat::new(label, absolute(&url)))
            })
            .collect();
        Ok(formats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_prefixes_protocol_relative_urls() {
        assert_eq!(
            absolute("//cdn.streamable.com/video/mp4/abc.mp4"),
            "https://cdn.streamable.com/video/mp4/abc.mp4"
        );
        assert_eq!(
            absolute("https://cdn.streamable.com/abc.mp4"),
            "https://cdn.streamable.com/abc.mp4"
        );
    }
}
