//! Shared test fixtures: mock forum, guard, mirror adapters, and vine
//! resolver. No network, no filesystem.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::forum::{ForumClient, ForumError, Result as ForumResult};
use crate::guard::ProcessedStore;
use crate::mirrors::{MirrorAdapter, MirrorError, Result as MirrorResult, VineResolver};
use crate::models::{CommentEntry, MediaFormat, MirrorService, Submission};

/// Convert calls observed across all mock adapters: (service, media URL).
pub type CallLog = Arc<Mutex<Vec<(MirrorService, String)>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Services whose convert was called, in call order.
pub fn converted_services(log: &CallLog) -> Vec<MirrorService> {
    log.lock().unwrap().iter().map(|(s, _)| *s).collect()
}

pub fn submission(domain: &str, url: &str) -> Submission {
    Submission {
        id: "2k4ha1".to_string(),
        fullname: "t3_2k4ha1".to_string(),
        channel: "soccer".to_string(),
        title: "Great goal".to_string(),
        url: url.to_string(),
        domain: domain.to_string(),
        created_utc: Utc::now(),
    }
}

#[derive(Default)]
pub struct MockForum {
    pub posts: Vec<Submission>,
    pub comments: Vec<CommentEntry>,
    pub rate_limited: bool,
    pub added: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ForumClient for MockForum {
    async fn list_new(&self, _channel: &str, _limit: u32) -> ForumResult<Vec<Submission>> {
        Ok(self.posts.clone())
    }

    async fn comments(&self, _post_id: &str) -> ForumResult<Vec<CommentEntry>> {
        Ok(self.comments.clone())
    }

    async fn add_comment(&self, fullname: &str, body: &str) -> ForumResult<()> {
        if self.rate_limited {
            return Err(ForumError::RateLimited(
                "you are doing that too much".to_string(),
            ));
        }
        self.added
            .lock()
            .unwrap()
            .push((fullname.to_string(), body.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockGuard {
    pub keys: Mutex<HashSet<String>>,
    pub failing: bool,
}

#[async_trait]
impl ProcessedStore for MockGuard {
    async fn is_processed(&self, key: &str) -> anyhow::Result<bool> {
        if self.failing {
            anyhow::bail!("guard unavailable");
        }
        Ok(self.keys.lock().unwrap().contains(key))
    }

    async fn mark_processed(&self, key: &str) -> anyhow::Result<()> {
        self.keys.lock().unwrap().insert(key.to_string());
        Ok(())
    }

    async fn unmark(&self, key: &str) -> anyhow::Result<()> {
        self.keys.lock().unwrap().remove(key);
        Ok(())
    }
}

pub struct MockAdapter {
    target: MirrorService,
    converted: Option<String>,
    formats: Vec<MediaFormat>,
    failing: bool,
    calls: CallLog,
}

impl MockAdapter {
    /// Adapter that declines every conversion.
    pub fn declining(target: MirrorService, calls: &CallLog) -> Self {
        Self {
            target,
            converted: None,
            formats: Vec::new(),
            failing: false,
            calls: calls.clone(),
        }
    }

    /// Adapter that converts everything to a fixed canonical URL.
    pub fn converting(target: MirrorService, url: &str, calls: &CallLog) -> Self {
        Self {
            converted: Some(url.to_string()),
            ..Self::declining(target, calls)
        }
    }

    /// Adapter whose requests all fail.
    pub fn failing(target: MirrorService, calls: &CallLog) -> Self {
        Self {
            failing: true,
            ..Self::declining(target, calls)
        }
    }

    pub fn with_formats(mut self, formats: Vec<MediaFormat>) -> Self {
        self.formats = formats;
        self
    }
}

#[async_trait]
impl MirrorAdapter for MockAdapter {
    fn service(&self) -> MirrorService {
        self.target
    }

    async fn convert(&self, _title: &str, url: &str) -> MirrorResult<Option<String>> {
        self.calls
            .lock()
            .unwrap()
            .push((self.target, url.to_string()));
        if self.failing {
            return Err(MirrorError::Network("mirror down".to_string()));
        }
        Ok(self.converted.clone())
    }

    async fn fetch_formats(&self, _id: &str) -> MirrorResult<Vec<MediaFormat>> {
        if self.failing {
            return Err(MirrorError::Network("mirror down".to_string()));
        }
        Ok(self.formats.clone())
    }
}

/// One declining adapter per service, in the fixed order.
pub fn declining_adapters(calls: &CallLog) -> Vec<Box<dyn MirrorAdapter>> {
    MirrorService::ALL
        .iter()
        .map(|s| Box::new(MockAdapter::declining(*s, calls)) as Box<dyn MirrorAdapter>)
        .collect()
}

pub struct MockVine {
    pub video: String,
}

#[async_trait]
impl VineResolver for MockVine {
    async fn video_url(&self, _url: &str) -> MirrorResult<String> {
        Ok(self.video.clone())
    }

    fn cdn_url(&self, url: &str) -> String {
        url.split('?').next().unwrap_or(url).to_string()
    }
}
