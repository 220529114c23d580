//! Reddit client over the cookie-session JSON API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::{ForumClient, ForumError, Result};
use crate::models::{CommentEntry, Submission};

const BASE_URL: &str = "https://www.reddit.com";
const LOGIN_URL: &str = "https://ssl.reddit.com/api/login";

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    json: ApiBody,
}

#[derive(Debug, Default, Deserialize)]
struct ApiBody {
    #[serde(default)]
    errors: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    data: Option<LoginData>,
}

#[derive(Debug, Default, Deserialize)]
struct LoginData {
    #[serde(default)]
    modhash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Default, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<PostChild>,
}

#[derive(Debug, Deserialize)]
struct PostChild {
    data: PostData,
}

#[derive(Debug, Default, Deserialize)]
struct PostData {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    domain: String,
    #[serde(default)]
    subreddit: String,
    #[serde(default)]
    created_utc: f64,
}

impl From<PostData> for Submission {
    fn from(data: PostData) -> Self {
        Submission {
            id: data.id,
            fullname: data.name,
            channel: data.subreddit,
            title: data.title,
            url: data.url,
            domain: data.domain,
            created_utc: chrono::DateTime::from_timestamp(data.created_utc as i64, 0)
                .unwrap_or_default(),
        }
    }
}

/// First error code in an API response body, if any.
fn first_error(body: &ApiBody) -> Option<(String, String)> {
    let entry = body.errors.first()?;
    let code = entry.first().and_then(|v| v.as_str()).unwrap_or("").to_string();
    let message = entry.get(1).and_then(|v| v.as_str()).unwrap_or("").to_string();
    Some((code, message))
}

pub struct RedditClient {
    client: reqwest::Client,
    modhash: String,
}

impl RedditClient {
    /// Log in with the bot account. The session cookie lives in the
    /// client's cookie store; the modhash rides along on writes.
    pub async fn login(
        user_agent: &str,
        timeout: Duration,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(timeout)
            .cookie_store(true)
            .build()?;

        let resp = client
            .post(format!("{}/{}", LOGIN_URL, username))
            .form(&[
                ("user", username),
                ("passwd", password),
                ("api_type", "json"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ForumError::Auth(format!("login returned {}", status)));
        }

        let envelope: ApiEnvelope = resp.json().await?;
        if let Some((code, message)) = first_error(&envelope.json) {
            return Err(ForumError::Auth(format!("{}: {}", code, message)));
        }

        let modhash = envelope
            .json
            .data
            .and_then(|data| data.modhash)
            .ok_or_else(|| ForumError::Auth("no modhash in login response".to_string()))?;

        info!(username, "logged in");
        Ok(Self { client, modhash })
    }
}

/// Depth-first flatten of a comment listing. `replies` on each comment is
/// either an empty string or a nested listing.
fn flatten_comments(listing: &serde_json::Value, out: &mut Vec<CommentEntry>) {
    let children = match listing["data"]["children"].as_array() {
        Some(children) => children,
        None => return,
    };

    for child in children {
        if child["kind"].as_str() != Some("t1") {
            continue;
        }
        let data = &child["data"];
        out.push(CommentEntry {
            author: data["author"].as_str().map(str::to_string),
            body: data["body"].as_str().unwrap_or("").to_string(),
        });
        if data["replies"].is_object() {
            flatten_comments(&data["replies"], out);
        }
    }
}

#[async_trait]
impl ForumClient for RedditClient {
    async fn list_new(&self, channel: &str, limit: u32) -> Result<Vec<Submission>> {
        let resp = self
            .client
            .get(format!("{}/r/{}/new.json", BASE_URL, channel))
            .query(&[("limit", limit.to_string())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ForumError::Api(format!(
                "listing r/{} returned {}",
                channel, status
            )));
        }

        let listing: Listing = resp.json().await?;
        debug!(channel, count = listing.data.children.len(), "listed new posts");
        Ok(listing
            .data
            .children
            .into_iter()
            .map(|child| Submission::from(child.data))
            .collect())
    }

    async fn comments(&self, post_id: &str) -> Result<Vec<CommentEntry>> {
        let resp = self
            .client
            .get(format!("{}/comments/{}.json", BASE_URL, post_id))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ForumError::Api(format!(
                "comments for {} returned {}",
                post_id, status
            )));
        }

        // The endpoint answers [post listing, comment listing].
        let body: serde_json::Value = resp.json().await?;
        let mut comments = Vec::new();
        if let Some(listing) = body.get(1) {
            flatten_comments(listing, &mut comments);
        }
        Ok(comments)
    }

    async fn add_comment(&self, fullname: &str, body: &str) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/api/comment", BASE_URL))
            .form(&[
                ("thing_id", fullname),
                ("text", body),
                ("uh", &self.modhash),
                ("api_type", "json"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ForumError::Api(format!(
                "comment on {} returned {}",
                fullname, status
            )));
        }

        let envelope: ApiEnvelope = resp.json().await?;
        if let Some((code, message)) = first_error(&envelope.json) {
            if code == "RATELIMIT" {
                return Err(ForumError::RateLimited(message));
            }
            return Err(ForumError::Api(format!("{}: {}", code, message)));
        }
        Ok(())
    }
}
