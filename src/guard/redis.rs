//! Redis-backed duplicate guard for deployments sharing one set across
//! hosts. A key holding the value `"True"` marks its post processed.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use super::ProcessedStore;

pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        info!(url, "connected guard to redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl ProcessedStore for RedisStore {
    async fn is_processed(&self, key: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value.as_deref() == Some("True"))
    }

    async fn mark_processed(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, "True").await?;
        Ok(())
    }

    async fn unmark(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
