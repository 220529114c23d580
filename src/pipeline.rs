//! Per-post processing: source resolution, mirroring, comment assembly
//! and posting, duplicate-guard update.
//!
//! Every error on this path is caught here. A post that cannot be
//! finished is deferred, not marked processed, so the next poll retries
//! it. Nothing below this module ever aborts the poll loop.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::forum::{ForumClient, ForumError};
use crate::guard::ProcessedStore;
use crate::mirrors::{extract_id, url_extension, MirrorAdapter, VineResolver};
use crate::models::{MirrorFormats, MirrorService, MirroredRecord, Submission};

/// Header above the mirror list.
pub const COMMENT_INTRO: &str = "Mirrored links\n------\n";

/// Fixed boilerplate appended after the mirror list.
pub const COMMENT_FOOTER: &str = "\n\n------\n\n\
[^Source ^Code](https://github.com/monokrome/mirrorbot) ^| \
[^Feedback/Bugs?](https://github.com/monokrome/mirrorbot/issues)\n";

/// Terminal state of one post's trip through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// Comment posted and the post marked processed.
    Commented,
    /// Dry-run finished one post; the process should exit.
    DryRunComplete,
    /// Post deferred or ineligible; it will be seen again next poll.
    Skipped,
}

pub struct Pipeline<'a> {
    settings: &'a Settings,
    forum: &'a dyn ForumClient,
    adapters: &'a [Box<dyn MirrorAdapter>],
    vine: &'a dyn VineResolver,
    guard: &'a dyn ProcessedStore,
    dry_run: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a Settings,
        forum: &'a dyn ForumClient,
        adapters: &'a [Box<dyn MirrorAdapter>],
        vine: &'a dyn VineResolver,
        guard: &'a dyn ProcessedStore,
        dry_run: bool,
    ) -> Self {
        Self {
            settings,
            forum,
            adapters,
            vine,
            guard,
            dry_run,
        }
    }

    /// Process one eligible post to a terminal state.
    pub async fn process(&self, post: &Submission) -> PostOutcome {
        match self.run(post).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(post = %post.id, %err, "processing failed, deferring to next poll");
                PostOutcome::Skipped
            }
        }
    }

    fn adapter_for(&self, service: MirrorService) -> Option<&dyn MirrorAdapter> {
        self.adapters
            .iter()
            .find(|a| a.service() == service)
            .map(|a| a.as_ref())
    }

    /// Direct URL of one format of a recorded mirror, by label.
    async fn format_url(
        &self,
        service: MirrorService,
        canonical_url: &str,
        label: &str,
    ) -> Option<String> {
        let adapter = self.adapter_for(service)?;
        match adapter.fetch_formats(extract_id(canonical_url)).await {
            Ok(formats) => formats.into_iter().find(|f| f.label == label).map(|f| f.url),
            Err(err) => {
                warn!(%service, %err, "format lookup failed");
                None
            }
        }
    }

    /// Domain-specific branch deciding the media URL the mirrors should
    /// fetch. Posts already on a mirror service get that record field set
    /// here, which both skips the redundant conversion later and feeds the
    /// canonical link into the comment.
    async fn resolve_source(
        &self,
        post: &Submission,
        record: &mut MirroredRecord,
    ) -> anyhow::Result<Option<String>> {
        let url = post.url.clone();
        let media = match post.domain.as_str() {
            "vine.co" => Some(self.vine.video_url(&url).await?),
            "v.cdn.vine.co" => Some(self.vine.cdn_url(&url)),
            "gfycat.com" => {
                record.set_url(MirrorService::Gfycat, &url);
                self.format_url(MirrorService::Gfycat, &url, "mp4").await
            }
            "giant.gfycat.com" => {
                // The giant host serves the transcoded file directly; the
                // canonical page is the same path without the prefix.
                let stripped = url.replacen("giant.", "", 1);
                record.set_url(MirrorService::Gfycat, &stripped);
                Some(stripped)
            }
            "offsided.com" => {
                record.set_url(MirrorService::Offsided, &url);
                self.format_url(MirrorService::Offsided, &url, "mp4").await
            }
            "mediacru.sh" => {
                record.set_url(MirrorService::Mediacrush, &url);
                self.format_url(MirrorService::Mediacrush, &url, "mp4")
                    .await
            }
            "streamable.com" => {
                record.set_url(MirrorService::Streamable, &url);
                self.format_url(MirrorService::Streamable, &url, "mp4")
                    .await
            }
            "imgur.com" | "i.imgur.com" => {
                record.set_url(MirrorService::Imgur, &url);
                let wanted = if url_extension(&url) == ".gif" {
                    "gif"
                } else {
                    "mp4"
                };
                self.format_url(MirrorService::Imgur, &url, wanted).await
            }
            // Direct-file hosts (zippy/fat gfycat and the like) need no
            // resolution.
            _ => Some(url),
        };
        Ok(media)
    }

    async fn run(&self, post: &Submission) -> anyhow::Result<PostOutcome> {
        let mut record = MirroredRecord::new(&post.id, &post.url);

        let media_url = match self.resolve_source(post, &mut record).await? {
            Some(url) => url,
            None => {
                info!(post = %post.id, url = %post.url, "no mirrorable media URL, skipping");
                return Ok(PostOutcome::Skipped);
            }
        };

        // A post already canonical on the primary host skips the transcode
        // and, later, the post-comment cooldown.
        let already_primary = record.url_for(MirrorService::Gfycat).is_some();

        info!(post = %post.id, %media_url, "beginning conversion");
        for adapter in self.adapters {
            let service = adapter.service();
            if record.url_for(service).is_some() {
                continue;
            }
            match adapter.convert(&post.title, &media_url).await {
                Ok(Some(url)) => {
                    info!(%service, %url, "mirror created");
                    record.set_url(service, url);
                }
                Ok(None) => debug!(%service, "conversion declined"),
                Err(err) => warn!(%service, %err, "mirror unavailable, skipping"),
            }
        }

        let mut formats = MirrorFormats::default();
        for adapter in self.adapters {
            let service = adapter.service();
            let url = match record.url_for(service) {
                Some(url) => url,
                None => continue,
            };
            match adapter.fetch_formats(extract_id(url)).await {
                Ok(media) => formats.insert(service, media),
                Err(err) => {
                    // The bullet still renders with just the canonical link.
                    warn!(%service, %err, "format metadata fetch failed");
                    formats.insert(service, Vec::new());
                }
            }
        }

        let body = format!(
            "{}{}{}",
            COMMENT_INTRO,
            record.render(&post.domain, &formats),
            COMMENT_FOOTER
        );

        if self.dry_run {
            info!(post = %post.id, "dry run, comment below");
            info!("{}", body);
            return Ok(PostOutcome::DryRunComplete);
        }

        info!(post = %post.id, "adding comment");
        match self.forum.add_comment(&post.fullname, &body).await {
            Ok(()) => {}
            Err(ForumError::RateLimited(message)) => {
                warn!(post = %post.id, %message, "rate limit exceeded, deferring");
                return Ok(PostOutcome::Skipped);
            }
            Err(err) => {
                warn!(post = %post.id, %err, "comment failed, deferring");
                return Ok(PostOutcome::Skipped);
            }
        }

        for key in [post.id.as_str(), post.url.as_str()] {
            if let Err(err) = self.guard.mark_processed(key).await {
                warn!(key, %err, "failed to mark processed");
            }
        }

        if !already_primary && self.settings.primary_cooldown_secs > 0 {
            // The primary host rejects rapid successive transcodes.
            info!(
                "waiting {}s before the next post",
                self.settings.primary_cooldown_secs
            );
            sleep(Duration::from_secs(self.settings.primary_cooldown_secs)).await;
        }

        Ok(PostOutcome::Commented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaFormat;
    use crate::testing::{
        call_log, converted_services, submission, MockAdapter, MockForum, MockGuard, MockVine,
    };

    fn test_settings() -> Settings {
        Settings {
            primary_cooldown_secs: 0,
            ..Settings::default()
        }
    }

    fn vine() -> MockVine {
        MockVine {
            video: "https://v.cdn.vine.co/videos/XYZ.mp4".to_string(),
        }
    }

    #[tokio::test]
    async fn test_streamable_post_end_to_end() {
        let settings = test_settings();
        let forum = MockForum::default();
        let guard = MockGuard::default();
        let vine = vine();
        let calls = call_log();
        let adapters: Vec<Box<dyn MirrorAdapter>> = vec![
            Box::new(MockAdapter::declining(MirrorService::Gfycat, &calls)),
            Box::new(MockAdapter::declining(MirrorService::Offsided, &calls)),
            Box::new(MockAdapter::declining(MirrorService::Mediacrush, &calls)),
            Box::new(MockAdapter::declining(MirrorService::Imgur, &calls)),
            Box::new(
                MockAdapter::declining(MirrorService::Streamable, &calls).with_formats(vec![
                    MediaFormat::new("mp4", "https://cdn.streamable.com/video/mp4/abc123.mp4"),
                ]),
            ),
        ];
        let pipeline = Pipeline::new(&settings, &forum, &adapters, &vine, &guard, false);

        let post = submission("streamable.com", "https://streamable.com/abc123");
        let outcome = pipeline.process(&post).await;
        assert_eq!(outcome, PostOutcome::Commented);

        // Every adapter except the post's own service was asked to convert
        // the resolved media URL.
        assert_eq!(
            converted_services(&calls),
            vec![
                MirrorService::Gfycat,
                MirrorService::Offsided,
                MirrorService::Mediacrush,
                MirrorService::Imgur,
            ]
        );
        for (_, media_url) in calls.lock().unwrap().iter() {
            assert_eq!(media_url, "https://cdn.streamable.com/video/mp4/abc123.mp4");
        }

        let added = forum.added.lock().unwrap();
        assert_eq!(added.len(), 1);
        let (fullname, body) = &added[0];
        assert_eq!(fullname, "t3_2k4ha1");
        assert!(body.starts_with(COMMENT_INTRO));
        assert!(body.ends_with(COMMENT_FOOTER));

        // First bullet after the original link is the canonical streamable
        // link; no other mirrors succeeded.
        let original = body.find("* [Original (streamable.com)]").unwrap();
        let streamable = body
            .find("* [Streamable](https://streamable.com/abc123)")
            .unwrap();
        assert!(original < streamable);
        assert!(!body.contains("[Gfycat]"));
        drop(added);

        let keys = guard.keys.lock().unwrap();
        assert!(keys.contains("2k4ha1"));
        assert!(keys.contains("https://streamable.com/abc123"));
    }

    #[tokio::test]
    async fn test_vine_post_resolves_video_and_warns_about_audio() {
        let settings = test_settings();
        let forum = MockForum::default();
        let guard = MockGuard::default();
        let vine = vine();
        let calls = call_log();
        let adapters: Vec<Box<dyn MirrorAdapter>> = vec![
            Box::new(MockAdapter::converting(
                MirrorService::Gfycat,
                "https://gfycat.com/TameRichCrane",
                &calls,
            )),
            Box::new(MockAdapter::declining(MirrorService::Offsided, &calls)),
            Box::new(MockAdapter::declining(MirrorService::Mediacrush, &calls)),
            Box::new(MockAdapter::declining(MirrorService::Imgur, &calls)),
            Box::new(MockAdapter::declining(MirrorService::Streamable, &calls)),
        ];
        let pipeline = Pipeline::new(&settings, &forum, &adapters, &vine, &guard, false);

        let post = submission("vine.co", "https://vine.co/v/xyz");
        let outcome = pipeline.process(&post).await;
        assert_eq!(outcome, PostOutcome::Commented);

        // Conversion used the resolved direct video, not the page link.
        assert_eq!(
            calls.lock().unwrap()[0],
            (
                MirrorService::Gfycat,
                "https://v.cdn.vine.co/videos/XYZ.mp4".to_string()
            )
        );

        let added = forum.added.lock().unwrap();
        let (_, body) = &added[0];
        assert!(body.contains("which has audio"));
        assert!(body.contains("* [Gfycat](https://gfycat.com/TameRichCrane)"));
    }

    #[tokio::test]
    async fn test_rate_limited_comment_defers_post() {
        let settings = test_settings();
        let forum = MockForum {
            rate_limited: true,
            ..Default::default()
        };
        let guard = MockGuard::default();
        let vine = vine();
        let calls = call_log();
        let adapters = crate::testing::declining_adapters(&calls);
        let pipeline = Pipeline::new(&settings, &forum, &adapters, &vine, &guard, false);

        let post = submission("zippy.gfycat.com", "https://zippy.gfycat.com/Tame.mp4");
        let outcome = pipeline.process(&post).await;

        assert_eq!(outcome, PostOutcome::Skipped);
        // Not marked processed: the next poll retries it.
        assert!(guard.keys.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_logs_instead_of_posting() {
        let settings = test_settings();
        let forum = MockForum::default();
        let guard = MockGuard::default();
        let vine = vine();
        let calls = call_log();
        let adapters = crate::testing::declining_adapters(&calls);
        let pipeline = Pipeline::new(&settings, &forum, &adapters, &vine, &guard, true);

        let post = submission("zippy.gfycat.com", "https://zippy.gfycat.com/Tame.mp4");
        let outcome = pipeline.process(&post).await;

        assert_eq!(outcome, PostOutcome::DryRunComplete);
        assert!(forum.added.lock().unwrap().is_empty());
        assert!(guard.keys.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_mirror_skips_only_that_service() {
        let settings = test_settings();
        let forum = MockForum::default();
        let guard = MockGuard::default();
        let vine = vine();
        let calls = call_log();
        let adapters: Vec<Box<dyn MirrorAdapter>> = vec![
            Box::new(MockAdapter::failing(MirrorService::Gfycat, &calls)),
            Box::new(MockAdapter::converting(
                MirrorService::Offsided,
                "https://offsided.com/v/O1",
                &calls,
            )),
            Box::new(MockAdapter::declining(MirrorService::Mediacrush, &calls)),
            Box::new(MockAdapter::declining(MirrorService::Imgur, &calls)),
            Box::new(MockAdapter::declining(MirrorService::Streamable, &calls)),
        ];
        let pipeline = Pipeline::new(&settings, &forum, &adapters, &vine, &guard, false);

        let post = submission("zippy.gfycat.com", "https://zippy.gfycat.com/Tame.mp4");
        let outcome = pipeline.process(&post).await;
        assert_eq!(outcome, PostOutcome::Commented);

        let added = forum.added.lock().unwrap();
        let (_, body) = &added[0];
        assert!(body.contains("* [Offsided](https://offsided.com/v/O1)"));
        assert!(!body.contains("[Gfycat]"));
    }

    #[tokio::test]
    async fn test_imgur_post_without_video_formats_is_skipped() {
        let settings = test_settings();
        let forum = MockForum::default();
        let guard = MockGuard::default();
        let vine = vine();
        let calls = call_log();
        let adapters = crate::testing::declining_adapters(&calls);
        let pipeline = Pipeline::new(&settings, &forum, &adapters, &vine, &guard, false);

        let post = submission("imgur.com", "https://imgur.com/abc");
        let outcome = pipeline.process(&post).await;

        assert_eq!(outcome, PostOutcome::Skipped);
        assert!(forum.added.lock().unwrap().is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_giant_gfycat_is_already_canonical() {
        let settings = test_settings();
        let forum = MockForum::default();
        let guard = MockGuard::default();
        let vine = vine();
        let calls = call_log();
        let adapters = crate::testing::declining_adapters(&calls);
        let pipeline = Pipeline::new(&settings, &forum, &adapters, &vine, &guard, false);

        let post = submission("giant.gfycat.com", "https://giant.gfycat.com/Tame.mp4");
        let outcome = pipeline.process(&post).await;
        assert_eq!(outcome, PostOutcome::Commented);

        // No primary-host conversion; everything else was attempted.
        assert_eq!(
            converted_services(&calls),
            vec![
                MirrorService::Offsided,
                MirrorService::Mediacrush,
                MirrorService::Imgur,
                MirrorService::Streamable,
            ]
        );

        let added = forum.added.lock().unwrap();
        let (_, body) = &added[0];
        assert!(body.contains("* [Gfycat](https://gfycat.com/Tame.mp4)"));
    }
}
