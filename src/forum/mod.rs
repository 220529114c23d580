//! Forum access: listing channel posts, scanning comments, commenting.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CommentEntry, Submission};

mod reddit;

pub use reddit::RedditClient;

pub type Result<T> = std::result::Result<T, ForumError>;

#[derive(Debug, Error)]
pub enum ForumError {
    /// Login rejected. Fatal at startup; never retried.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The forum's comment rate limit was hit. Per-comment, non-fatal.
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("forum API error: {0}")]
    Api(String),

    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for ForumError {
    fn from(err: reqwest::Error) -> Self {
        ForumError::Network(err.to_string())
    }
}

/// The forum operations the bot consumes.
#[async_trait]
pub trait ForumClient: Send + Sync {
    /// Newest posts in a channel, most recent first.
    async fn list_new(&self, channel: &str, limit: u32) -> Result<Vec<Submission>>;

    /// All comments on a post, flattened. Authors may be absent (deleted
    /// accounts); that is a normal value, not an error.
    async fn comments(&self, post_id: &str) -> Result<Vec<CommentEntry>>;

    /// Post a comment on the thing named by `fullname`.
    async fn add_comment(&self, fullname: &str, body: &str) -> Result<()>;
}
