//! # FlagService
//!
//! Request-level composition of [`FlagStore`] and [`RateLimiter`]: input
//! normalisation, the rate-limit gate on creation, and hash lookups.

use domains::{DomainError, DomainResult, FlagRecord, TileHash};
use tracing::warn;

use crate::flag_store::{CreateOutcome, FlagLookup, FlagStore};
use crate::rate_limiter::{RateDecision, RateLimiter};

/// Largest hash set a single lookup request may carry.
pub const MAX_LOOKUP_HASHES: usize = 100;

#[derive(Clone)]
pub struct FlagService {
    store: FlagStore,
    limiter: RateLimiter,
}

impl FlagService {
    pub fn new(store: FlagStore, limiter: RateLimiter) -> Self {
        Self { store, limiter }
    }

    pub fn store(&self) -> &FlagStore {
        &self.store
    }

    /// Flags a tile on behalf of `client_ip`.
    ///
    /// The rate-limit counter only advances when a new flag was written.
    pub async fn flag_tile(
        &self,
        tile_hash: &str,
        tile_path: Option<&str>,
        client_ip: &str,
    ) -> DomainResult<FlagRecord> {
        let tile_hash = TileHash::parse(tile_hash)?;

        if let RateDecision::Denied { .. } = self.limiter.check_and_reserve(client_ip).await {
            let policy = self.limiter.policy();
            return Err(DomainError::RateLimited {
                limit: policy.max_per_window,
                window_secs: policy.window_secs,
            });
        }

        match self
            .store
            .create(tile_hash.clone(), tile_path.unwrap_or_default(), client_ip)
            .await?
        {
            CreateOutcome::Created(record) => {
                if let Err(err) = self.limiter.consume(client_ip).await {
                    // The flag is already written; a lost increment only loosens the limit.
                    warn!(client_ip, error = %err, "failed to record flag against rate limit");
                }
                Ok(record)
            }
            CreateOutcome::AlreadyFlagged => Err(DomainError::Conflict(format!(
                "tile {tile_hash} is already flagged"
            ))),
        }
    }

    /// Succeeds whether or not the tile was flagged.
    pub async fn unflag_tile(&self, tile_hash: &str) -> DomainResult<TileHash> {
        let tile_hash = TileHash::parse(tile_hash)?;
        self.store.remove(&tile_hash).await?;
        Ok(tile_hash)
    }

    pub async fn lookup(&self, tile_hashes: &[String]) -> DomainResult<FlagLookup> {
        if tile_hashes.is_empty() {
            return Err(DomainError::Validation("tileHashes array required".into()));
        }
        if tile_hashes.len() > MAX_LOOKUP_HASHES {
            return Err(DomainError::Validation(format!(
                "Maximum {MAX_LOOKUP_HASHES} tile hashes per request"
            )));
        }
        let parsed = tile_hashes
            .iter()
            .map(|raw| TileHash::parse(raw))
            .collect::<DomainResult<Vec<_>>>()?;
        self.store.batch_get(&parsed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use domains::testing::ManualClock;
    use domains::MockRateLimitTable;
    use storage_adapters::memory::{MemoryFlagTable, MemoryRateLimitTable};

    use crate::rate_limiter::RateLimitPolicy;

    fn service() -> FlagService {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap(),
        ));
        let store = FlagStore::new(Arc::new(MemoryFlagTable::new()), clock.clone());
        let limiter = RateLimiter::new(
            Arc::new(MemoryRateLimitTable::new()),
            clock,
            RateLimitPolicy::default(),
        );
        FlagService::new(store, limiter)
    }

    #[tokio::test]
    async fn duplicate_flag_is_a_conflict() {
        let service = service();
        service.flag_tile("abc", Some("/tiles/x.png"), "1.2.3.4").await.unwrap();

        let err = service.flag_tile("abc", None, "1.2.3.4").await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn conflicts_do_not_consume_quota() {
        let service = service();
        service.flag_tile("abc", None, "1.2.3.4").await.unwrap();
        for _ in 0..20 {
            let _ = service.flag_tile("abc", None, "1.2.3.4").await;
        }
        // Nine more distinct flags still fit in the window.
        for i in 0..9 {
            service.flag_tile(&format!("t{i}"), None, "1.2.3.4").await.unwrap();
        }
        let err = service.flag_tile("one-too-many", None, "1.2.3.4").await.unwrap_err();
        assert_eq!(err, DomainError::RateLimited { limit: 10, window_secs: 60 });
    }

    #[tokio::test]
    async fn failed_consume_still_returns_the_flag() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut counters = MockRateLimitTable::new();
        counters.expect_current_count().returning(|_| Ok(0));
        counters
            .expect_increment()
            .returning(|_, _| Err(DomainError::store("throttled")));
        let service = FlagService::new(
            FlagStore::new(Arc::new(MemoryFlagTable::new()), clock.clone()),
            RateLimiter::new(Arc::new(counters), clock, RateLimitPolicy::default()),
        );

        let record = service.flag_tile("abc", None, "ip").await.unwrap();
        assert_eq!(record.tile_path, "");
    }

    #[tokio::test]
    async fn unflag_is_idempotent_and_validates_input() {
        let service = service();
        service.unflag_tile("never-flagged").await.unwrap();
        assert!(matches!(
            service.unflag_tile("  ").await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn lookup_enforces_batch_bounds() {
        let service = service();
        assert!(matches!(service.lookup(&[]).await, Err(DomainError::Validation(_))));

        let too_many: Vec<String> = (0..101).map(|i| format!("h{i}")).collect();
        let err = service.lookup(&too_many).await.unwrap_err();
        assert_eq!(
            err,
            DomainError::Validation("Maximum 100 tile hashes per request".into())
        );

        service.flag_tile("h1", Some("/h1.png"), "ip").await.unwrap();
        let lookup = service.lookup(&["h1".into(), "h2".into()]).await.unwrap();
        assert_eq!(lookup.flags.len(), 1);
    }
}
