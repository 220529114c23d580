//! Duplicate guard: the record of posts the bot has already answered.
//!
//! Backed either by a local file (default) or by redis when several hosts
//! share one guard. Selection is by the `guard_backend` setting.

use async_trait::async_trait;

use crate::config::Settings;

mod file;
#[cfg(feature = "redis-backend")]
mod redis;

pub use file::FileStore;
#[cfg(feature = "redis-backend")]
pub use redis::RedisStore;

/// Membership set of processed post ids and URLs.
///
/// `is_processed` errors mean the backing store could not answer; callers
/// treat that as "skip the post" rather than risk a double comment.
#[async_trait]
pub trait ProcessedStore: Send + Sync {
    async fn is_processed(&self, key: &str) -> anyhow::Result<bool>;

    async fn mark_processed(&self, key: &str) -> anyhow::Result<()>;

    /// Administrative correction path.
    async fn unmark(&self, key: &str) -> anyhow::Result<()>;

    /// Write the set out to persistent storage. Remote stores are already
    /// durable and keep the default no-op.
    async fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Open the guard backend named by the settings.
pub async fn open_store(settings: &Settings) -> anyhow::Result<Box<dyn ProcessedStore>> {
    match settings.guard_backend.as_deref() {
        None | Some("file") => Ok(Box::new(FileStore::load(&settings.guard_path()))),
        Some(url) if url.starts_with("redis://") => {
            #[cfg(feature = "redis-backend")]
            {
                Ok(Box::new(RedisStore::connect(url).await?))
            }
            #[cfg(not(feature = "redis-backend"))]
            {
                anyhow::bail!(
                    "guard_backend '{}' requires the redis-backend feature",
                    url
                )
            }
        }
        Some(other) => anyhow::bail!("unknown guard_backend '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_store_rejects_unknown_backend() {
        let settings = Settings {
            guard_backend: Some("sqlite".to_string()),
            ..Settings::default()
        };
        assert!(open_store(&settings).await.is_err());
    }

    #[cfg(not(feature = "redis-backend"))]
    #[tokio::test]
    async fn test_open_store_rejects_redis_without_feature() {
        let settings = Settings {
            guard_backend: Some("redis://localhost:6379".to_string()),
            ..Settings::default()
        };
        let err = match open_store(&settings).await {
            Ok(_) => panic!("expected open_store to reject redis:// without feature"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("redis-backend"));
    }
}
