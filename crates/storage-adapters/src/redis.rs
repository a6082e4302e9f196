//! Rate-limit counters in Redis. Each window is one `INCR` key carrying an
//! absolute expiry, so stale windows disappear without a sweeper.

use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config, Connection, Pool, Runtime};
use domains::{DomainError, DomainResult, RateLimitTable, RateWindow};
use tracing::instrument;

const KEY_PREFIX: &str = "tile-flag-rate";

#[derive(Clone)]
pub struct RedisRateLimitTable {
    pool: Pool,
}

impl RedisRateLimitTable {
    pub fn connect(url: &str) -> DomainResult<Self> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(DomainError::store)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> DomainResult<Connection> {
        self.pool.get().await.map_err(DomainError::store)
    }

    fn key(window: &RateWindow) -> String {
        format!("{KEY_PREFIX}:{}", window.storage_key())
    }
}

#[async_trait]
impl RateLimitTable for RedisRateLimitTable {
    #[instrument(skip(self), fields(backend = "redis"))]
    async fn current_count(&self, window: &RateWindow) -> DomainResult<u32> {
        let mut conn = self.connection().await?;
        let count: Option<u32> = conn
            .get(Self::key(window))
            .await
            .map_err(DomainError::store)?;
        Ok(count.unwrap_or(0))
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn increment(&self, window: &RateWindow, expires_at: i64) -> DomainResult<u32> {
        let key = Self::key(window);
        let mut conn = self.connection().await?;
        let (count,): (u32,) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .expire_at(&key, expires_at)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(DomainError::store)?;
        Ok(count)
    }
}
