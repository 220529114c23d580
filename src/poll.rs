//! The poll loop: list recent posts per channel and feed eligible ones to
//! the pipeline in chronological order.

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::classifier;
use crate::config::Settings;
use crate::forum::ForumClient;
use crate::guard::ProcessedStore;
use crate::pipeline::{Pipeline, PostOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    /// A dry-run post finished; the process should exit.
    DryRunComplete,
}

/// One full pass over every configured channel.
pub async fn poll_cycle(
    settings: &Settings,
    bot_name: &str,
    forum: &dyn ForumClient,
    guard: &dyn ProcessedStore,
    pipeline: &Pipeline<'_>,
) -> CycleOutcome {
    for channel in &settings.channels {
        info!(%channel, "checking for new posts");

        let posts = match forum.list_new(channel, settings.listing_limit).await {
            Ok(posts) => posts,
            Err(err) => {
                warn!(%channel, %err, "listing failed, skipping channel");
                continue;
            }
        };

        let cutoff = Utc::now() - Duration::minutes(settings.poll_window_minutes);
        let mut recent: Vec<_> = posts
            .into_iter()
            .filter(|post| post.created_utc > cutoff)
            .collect();
        recent.sort_by_key(|post| post.created_utc);

        if recent.is_empty() {
            info!(%channel, "nothing new");
            continue;
        }

        for post in &recent {
            debug!(title = %post.title, "analyzing");
            let validation = match classifier::validate_submission(
                post, settings, bot_name, forum, guard,
            )
            .await
            {
                Ok(validation) => validation,
                Err(err) => {
                    warn!(post = %post.id, %err, "validation failed, skipping post");
                    continue;
                }
            };

            if validation.valid {
                info!(channel = %post.channel, url = %post.url, "new post");
                if pipeline.process(post).await == PostOutcome::DryRunComplete {
                    return CycleOutcome::DryRunComplete;
                }
            } else if validation.already_handled {
                // The scan has caught up with work a previous cycle already
                // did; anything newer is still inside the window next time.
                debug!(%channel, "already handled, stopping channel scan");
                break;
            }
        }
    }

    CycleOutcome::Completed
}
