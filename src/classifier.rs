//! Submission validation ahead of the processing pipeline.

use tracing::{debug, warn};

use crate::config::Settings;
use crate::forum::ForumClient;
use crate::guard::ProcessedStore;
use crate::mirrors::url_extension;
use crate::models::Submission;

/// Two-flag validation result.
///
/// `already_handled` lets the poll loop stop a channel scan early: the
/// scan runs in chronological order, so everything behind an answered
/// post has been answered too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub already_handled: bool,
}

impl Validation {
    const REJECTED: Validation = Validation {
        valid: false,
        already_handled: false,
    };

    const HANDLED: Validation = Validation {
        valid: false,
        already_handled: true,
    };

    const ACCEPTED: Validation = Validation {
        valid: true,
        already_handled: false,
    };
}

/// Decide whether a post should enter the pipeline.
///
/// A post qualifies when its source domain is allow-listed and its link
/// extension is not a still image, or when the extension is explicitly
/// allow-listed regardless of domain. Qualifying posts are then checked
/// against the duplicate guard and the post's own comments.
pub async fn validate_submission(
    post: &Submission,
    settings: &Settings,
    bot_name: &str,
    forum: &dyn ForumClient,
    guard: &dyn ProcessedStore,
) -> anyhow::Result<Validation> {
    let extension = url_extension(&post.url).to_string();

    let domain_ok = settings.allowed_domains.iter().any(|d| d == &post.domain)
        && !settings.disabled_extensions.contains(&extension);
    let extension_ok = settings.allowed_extensions.contains(&extension);

    if !(domain_ok || extension_ok) {
        return Ok(Validation::REJECTED);
    }

    // Guard first: cheap relative to the comment scan. A guard that cannot
    // answer fails closed so the post is never double-commented.
    for key in [post.id.as_str(), post.url.as_str()] {
        match guard.is_processed(key).await {
            Ok(true) => {
                debug!(post = %post.id, "already in duplicate guard, skipping");
                return Ok(Validation::HANDLED);
            }
            Ok(false) => {}
            Err(err) => {
                warn!(post = %post.id, %err, "duplicate guard unavailable, skipping post");
                return Ok(Validation::HANDLED);
            }
        }
    }

    let comments = forum.comments(&post.id).await?;
    let previously_commented = comments
        .iter()
        .any(|comment| comment.author.as_deref() == Some(bot_name));
    if previously_commented {
        debug!(post = %post.id, "previously commented, skipping");
        return Ok(Validation::HANDLED);
    }

    Ok(Validation::ACCEPTED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CommentEntry;
    use crate::testing::{submission, MockForum, MockGuard};

    const BOT: &str = "mirrorbot";

    #[tokio::test]
    async fn test_rejects_unlisted_domain_and_extension() {
        let forum = MockForum::default();
        let guard = MockGuard::default();
        let post = submission("example.com", "https://example.com/clip.mov");

        let validation =
            validate_submission(&post, &Settings::default(), BOT, &forum, &guard)
                .await
                .unwrap();
        assert_eq!(validation, Validation::REJECTED);
    }

    #[tokio::test]
    async fn test_extension_allow_list_overrides_domain() {
        let forum = MockForum::default();
        let guard = MockGuard::default();
        let post = submission("example.com", "https://example.com/clip.gif");

        let validation =
            validate_submission(&post, &Settings::default(), BOT, &forum, &guard)
                .await
                .unwrap();
        assert_eq!(validation, Validation::ACCEPTED);
    }

    #[tokio::test]
    async fn test_disabled_extension_rejects_allowed_domain() {
        let forum = MockForum::default();
        let guard = MockGuard::default();
        let post = submission("imgur.com", "https://imgur.com/shot.jpg");

        let validation =
            validate_submission(&post, &Settings::default(), BOT, &forum, &guard)
                .await
                .unwrap();
        assert_eq!(validation, Validation::REJECTED);
    }

    #[tokio::test]
    async fn test_accepts_canonical_source_post() {
        let forum = MockForum::default();
        let guard = MockGuard::default();
        let post = submission("gfycat.com", "https://gfycat.com/TameRichCrane.gif");

        let validation =
            validate_submission(&post, &Settings::default(), BOT, &forum, &guard)
                .await
                .unwrap();
        assert_eq!(validation, Validation::ACCEPTED);
    }

    #[tokio::test]
    async fn test_prior_bot_comment_marks_handled() {
        let forum = MockForum {
            comments: vec![
                CommentEntry {
                    author: Some("somebody".to_string()),
                    body: "nice".to_string(),
                },
                CommentEntry {
                    author: Some(BOT.to_string()),
                    body: "Mirrored links".to_string(),
                },
            ],
            ..Default::default()
        };
        let guard = MockGuard::default();
        let post = submission("streamable.com", "https://streamable.com/abc123");

        let validation =
            validate_submission(&post, &Settings::default(), BOT, &forum, &guard)
                .await
                .unwrap();
        assert_eq!(validation, Validation::HANDLED);
    }

    #[tokio::test]
    async fn test_guarded_post_marks_handled() {
        let forum = MockForum::default();
        let guard = MockGuard::default();
        guard.keys.lock().unwrap().insert("2k4ha1".to_string());
        let post = submission("streamable.com", "https://streamable.com/abc123");

        let validation =
            validate_submission(&post, &Settings::default(), BOT, &forum, &guard)
                .await
                .unwrap();
        assert_eq!(validation, Validation::HANDLED);
    }

    #[tokio::test]
    async fn test_guard_failure_fails_closed() {
        let forum = MockForum::default();
        let guard = MockGuard {
            failing: true,
            ..Default::default()
        };
        let post = submission("streamable.com", "https://streamable.com/abc123");

        let validation =
            validate_submission(&post, &Settings::default(), BOT, &forum, &guard)
                .await
                .unwrap();
        assert_eq!(validation, Validation::HANDLED);
    }
}
