//! Clients for the third-party mirror services.
//!
//! Each service gets one small HTTP client exposing `convert` (create or
//! locate a mirror of a source video) and `fetch_formats` (per-format
//! direct URLs for a known mirror id). Failures are per-service and never
//! abort processing of a whole post.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{Credentials, Settings};
use crate::models::{MediaFormat, MirrorService};

pub mod cooldown;
mod gfycat;
mod imgur;
mod mediacrush;
mod offsided;
mod streamable;
mod vine;

pub use cooldown::Cooldown;
pub use gfycat::GfycatClient;
pub use imgur::ImgurClient;
pub use mediacrush::MediacrushClient;
pub use offsided::OffsidedClient;
pub use streamable::StreamableClient;
pub use vine::{VineClient, VineResolver};

pub type Result<T> = std::result::Result<T, MirrorError>;

/// A mirror service was unreachable or answered with an error.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("network error: {0}")]
    Network(String),

    #[error("{service} API error (status {status}): {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },
}

impl From<reqwest::Error> for MirrorError {
    fn from(err: reqwest::Error) -> Self {
        MirrorError::Network(err.to_string())
    }
}

/// One mirror service the pipeline can convert through.
#[async_trait]
pub trait MirrorAdapter: Send + Sync {
    fn service(&self) -> MirrorService;

    /// Ask the service to create or locate a mirror of `url`. Returns the
    /// canonical mirror URL, or `None` when the service declines the input
    /// (unsupported format, size cap). `Err` means the service itself
    /// failed and this mirror should be skipped for the post.
    async fn convert(&self, title: &str, url: &str) -> Result<Option<String>>;

    /// Fetch the per-format direct URLs for a previously obtained mirror
    /// id. Formats the service does not provide are omitted.
    async fn fetch_formats(&self, id: &str) -> Result<Vec<MediaFormat>>;
}

/// Final `/`-delimited segment of a URL: the content id every mirror
/// service puts last in its canonical URLs.
pub fn extract_id(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or("")
}

/// Extension of a URL's last path segment, dot included (`".gif"`), or
/// empty when the segment has none. Query and fragment are ignored.
pub fn url_extension(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let segment = extract_id(&url[..end]);
    match segment.rfind('.') {
        Some(idx) => &segment[idx..],
        None => "",
    }
}

/// Size of a remote file from a HEAD request, when the server reports one.
pub async fn remote_size(client: &reqwest::Client, url: &str) -> Result<Option<u64>> {
    let resp = client.head(url).send().await?;
    Ok(resp.content_length())
}

/// Shared HTTP client for mirror and forum requests.
pub fn http_client(settings: &Settings) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(Duration::from_secs(settings.request_timeout))
        .build()
}

/// Construct every mirror adapter in the fixed service order, sharing one
/// HTTP client and one request pacer.
pub fn build_adapters(
    settings: &Settings,
    credentials: &Credentials,
    client: reqwest::Client,
) -> Vec<Box<dyn MirrorAdapter>> {
    let pacer = Arc::new(Cooldown::new(Duration::from_millis(
        settings.request_delay_ms,
    )));

    vec![
        Box::new(GfycatClient::new(client.clone(), pacer.clone())),
        Box::new(OffsidedClient::new(client.clone(), pacer.clone())),
        Box::new(MediacrushClient::new(client.clone(), pacer.clone())),
        Box::new(ImgurClient::new(
            client.clone(),
            pacer.clone(),
            credentials.imgur_client_id.clone(),
            settings.imgur_upload_limit,
        )),
        Box::new(StreamableClient::new(
            client,
            pacer,
            credentials.forum_username.clone(),
            credentials.streamable_password.clone(),
        )),
    ]
}
