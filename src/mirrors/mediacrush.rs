//! MediaCrush client, the alternate upload mirror.
//!
//! Uploads are by source URL; the service answers with a content hash that
//! doubles as the mirror id. Format metadata lists one file entry per
//! transcoded variant.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{Cooldown, MirrorAdapter, MirrorError, Result};
use crate::models::{MediaFormat, MirrorService};

const BASE_URL: &str = "https://mediacru.sh/api";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HashInfo {
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    #[serde(rename = "type")]
    mime: String,
    file: String,
}

pub struct MediacrushClient {
    client: reqwest::Client,
    pacer: Arc<Cooldown>,
}

impl MediacrushClient {
    pub fn new(client: reqwest::Client, pacer: Arc<Cooldown>) -> Self {
        Self { client, pacer }
    }
}

fn format_label(mime: &str) -> Option<&'static str> {
    match mime {
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

#[async_trait]
impl MirrorAdapter for MediacrushClient {
    fn service(&self) -> MirrorService {
        MirrorService::Mediacrush
    }

    async fn convert(&self, _title: &str, url: &str) -> Result<Option<String>> {
        self.pacer.wait_for_slot().await;

        let resp = self
            .client
            .post(format!("{}/upload/url", BASE_URL))
            .form(&[("url", url)])
            .send()
            .await?;

        let status = resp.status();
        // 415 = unsupported media type: a decline for this source.
        if status.as_u16() == 415 {
            debug!(url, "mediacrush declined upload");
            return Ok(None);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(MirrorError::Api {
                service: "mediacrush",
                status: status.as_u16(),
                message,
            });
        }

        let uploaded: UploadResponse = resp.json().await?;
        Ok(uploaded
            .hash
            .map(|hash| format!("https://mediacru.sh/{}", hash)))
    }

    async fn fetch_formats(&self, id: &str) -> Result<Vec<MediaFormat>> {
        self.pacer.wait_for_slot().await;

        let resp = self
            .client
            .get(format!("{}/{}", BASE_URL, id))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(MirrorError::Api {
                service: "mediacrush",
                status: status.as_u16(),
                message,
            });
        }

        let info: HashInfo = resp.json().await?;
        let formats = info
            .files
            .into_iter()
            .filter_map(|entry| {
                format_label(&entry.mime).map(|label| {
                    // File paths come back host-relative.
                    let url = if entry.file.starts_with("http") {
                        entry.file
                    } else {
                        format!("https://mediacru.sh{}", entry.file)
                    };
                    MediaFormat::new(label, url)
                })
            })
            .collect();
        Ok(formats)
    }
}
