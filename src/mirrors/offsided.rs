//! Offsided client, the sports-video mirror host.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Cooldown, MirrorAdapter, MirrorError, Result};
use crate::models::{MediaFormat, MirrorService};

const API_URL: &str = "https://offsided.com/api/v1/videos";

#[derive(Debug, Serialize)]
struct ConvertRequest<'a> {
    title: &'a str,
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ConvertResponse {
    #[serde(default)]
    permalink: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VideoInfo {
    #[serde(default)]
    mp4_url: Option<String>,
    #[serde(default)]
    webm_url: Option<String>,
    #[serde(default)]
    gif_url: Option<String>,
}

pub struct OffsidedClient {
    client: reqwest::Client,
    pacer: Arc<Cooldown>,
}

impl OffsidedClient {
    pub fn new(client: reqwest::Client, pacer: Arc<Cooldown>) -> Self {
        Self { client, pacer }
    }
}

#[async_trait]
impl MirrorAdapter for OffsidedClient {
    fn service(&self) -> MirrorService {
        MirrorService::Offsided
    }

    async fn convert(&self, title: &str, url: &str) -> Result<Option<String>> {
        self.pacer.wait_for_slot().await;

        let resp = self
            .client
            .post(format!("{}/convert", API_URL))
            .json(&ConvertRequest { title, url })
            .send()
            .await?;

        let status = resp.status();
        // Offsided answers 422 for inputs it cannot host; that is a decline,
        // not a service failure.
        if status.as_u16() == 422 {
            debug!(url, "offsided declined conversion");
            return Ok(None);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(MirrorError::Api {
                service: "offsided",
                status: status.as_u16(),
                message,
            });
        }

        let converted: ConvertResponse = resp.json().await?;
        Ok(converted.permalink)
    }

    async fn fetch_formats(&self, id: &str) -> Result<Vec<MediaFormat>> {
        self.pacer.wait_for_slot().await;

        let resp = self
            .client
            .get(format!("{}/{}", API_URL, id))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(MirrorError::Api {
                service: "offsided",
                status: status.as_u16(),
                message,
            });
        }

        let info: VideoInfo = resp.json().await?;
        let mut formats = Vec::new();
        if let Some(url) = info.mp4_url {
            formats.push(MediaFormat::new("mp4", url));
        }
        if let Some(url) = info.webm_url {
            formats.push(MediaFormat::new("webm", url));
        }
        if let Some(url) = info.gif_url {
            formats.push(MediaFormat::new("gif", url));
        }
        Ok(formats)
    }
}
