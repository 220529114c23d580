//! Gfycat client, the primary video host.
//!
//! Conversion goes through the transcode endpoint, which fetches the source
//! URL server-side. Gfycat rate-limits rapid successive transcodes; the
//! pipeline owns that pause.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{Cooldown, MirrorAdapter, MirrorError, Result};
use crate::models::{MediaFormat, MirrorService};

const TRANSCODE_URL: &str = "https://upload.gfycat.com/transcode";
const INFO_URL: &str = "https://gfycat.com/cajax/get";

#[derive(Debug, Deserialize)]
struct TranscodeResponse {
    #[serde(rename = "gfyName")]
    gfy_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(rename = "gfyItem")]
    gfy_item: GfyItem,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GfyItem {
    #[serde(default)]
    mp4_url: Option<String>,
    #[serde(default)]
    webm_url: Option<String>,
    #[serde(default)]
    gif_url: Option<String>,
}

pub struct GfycatClient {
    client: reqwest::Client,
    pacer: Arc<Cooldown>,
}

impl GfycatClient {
    pub fn new(client: reqwest::Client, pacer: Arc<Cooldown>) -> Self {
        Self { client, pacer }
    }

    async fn info(&self, id: &str) -> Result<GfyItem> {
        self.pacer.wait_for_slot().await;

        let url = format!("{}/{}", INFO_URL, id);
        let resp = self.client.get(&url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(MirrorError::Api {
                service: "gfycat",
                status: status.as_u16(),
                message,
            });
        }

        let info: InfoResponse = resp.json().await?;
        Ok(info.gfy_item)
    }
}

#[async_trait]
impl MirrorAdapter for GfycatClient {
    fn service(&self) -> MirrorService {
        MirrorService::Gfycat
    }

    async fn convert(&self, _title: &str, url: &str) -> Result<Option<String>> {
        self.pacer.wait_for_slot().await;

        let resp = self
            .client
            .get(TRANSCODE_URL)
            .query(&[("fetchUrl", url)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(MirrorError::Api {
                service: "gfycat",
                status: status.as_u16(),
                message,
            });
        }

        let transcode: TranscodeResponse = resp.json().await?;
        match transcode.gfy_name {
            Some(name) => Ok(Some(format!("https://gfycat.com/{}", name))),
            None => {
                debug!(url, "gfycat declined transcode");
                Ok(None)
            }
        }
    }

    async fn fetch_formats(&self, id: &str) -> Result<Vec<MediaFormat>> {
        let item = self.info(id).await?;

        let mut formats = Vec::new();
        if let Some(url) = item.mp4_url {
            formats.push(MediaFormat::new("mp4", url));
        }
        if let Some(url) = item.webm_url {
            formats.push(MediaFormat::new("webm", url));
        }
        if let Some(url) = item.gif_url {
            formats.push(MediaFormat::new("gif", url));
        }
        Ok(formats)
    }
}
