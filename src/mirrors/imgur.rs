//! Imgur client, the generic upload host.
//!
//! Anonymous API access authenticated by client id. URL uploads are capped
//! by imgur at 10 MiB, so sources are size-probed with a HEAD request and
//! declined when too large or of unknown size.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{remote_size, url_extension, Cooldown, MirrorAdapter, MirrorError, Result};
use crate::models::{MediaFormat, MirrorService};

const BASE_URL: &str = "https://api.imgur.com/3";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    #[serde(default)]
    link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ImageInfo {
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    mp4: Option<String>,
    #[serde(default)]
    webm: Option<String>,
}

pub struct ImgurClient {
    client: reqwest::Client,
    pacer: Arc<Cooldown>,
    client_id: String,
    upload_limit: u64,
}

impl ImgurClient {
    pub fn new(
        client: reqwest::Client,
        pacer: Arc<Cooldown>,
        client_id: String,
        upload_limit: u64,
    ) -> Self {
        Self {
            client,
            pacer,
            client_id,
            upload_limit,
        }
    }

    fn auth_header(&self) -> String {
        format!("Client-ID {}", self.client_id)
    }

    /// Image metadata by id.
    async fn image(&self, id: &str) -> Result<ImageInfo> {
        self.pacer.wait_for_slot().await;

        let resp = self
            .client
            .get(format!("{}/image/{}", BASE_URL, id))
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(MirrorError::Api {
                service: "imgur",
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<ImageInfo> = resp.json().await?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl MirrorAdapter for ImgurClient {
    fn service(&self) -> MirrorService {
        MirrorService::Imgur
    }

    async fn convert(&self, _title: &str, url: &str) -> Result<Option<String>> {
        match remote_size(&self.client, url).await? {
            Some(size) if size <= self.upload_limit => {}
            Some(size) => {
                debug!(url, size, "source exceeds imgur upload cap");
                return Ok(None);
            }
            None => {
                debug!(url, "source size unknown, skipping imgur upload");
                return Ok(None);
            }
        }

        self.pacer.wait_for_slot().await;

        let resp = self
            .client
            .post(format!("{}/upload", BASE_URL))
            .header("Authorization", self.auth_header())
            .form(&[("image", url), ("type", "url")])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(MirrorError::Api {
                service: "imgur",
                status: status.as_u16(),
                message,
            });
        }

        let uploaded: Envelope<UploadData> = resp.json().await?;
        Ok(uploaded.data.link)
    }

    async fn fetch_formats(&self, id: &str) -> Result<Vec<MediaFormat>> {
        let info = self.image(id).await?;

        let mut formats = Vec::new();
        if let Some(url) = info.mp4 {
            formats.push(MediaFormat::new("mp4", url));
        }
        if let Some(url) = info.webm {
            formats.push(MediaFormat::new("webm", url));
        }
        if let Some(link) = info.link {
            if url_extension(&link) == ".gif" {
                formats.push(MediaFormat::new("gif", link));
            }
        }
        Ok(formats)
    }
}
