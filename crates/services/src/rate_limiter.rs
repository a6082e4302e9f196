//! # RateLimiter
//!
//! Fixed one-minute windows per client. The check and the consume are two
//! separate store calls, so racing requests from one client can exceed the
//! ceiling slightly. The check fails open.

use std::sync::Arc;

use domains::{Clock, DomainResult, RateLimitTable, RateWindow};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_per_window: u32,
    pub window_secs: u64,
    /// Counter lifetime measured from the window start.
    pub counter_ttl_secs: u64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_per_window: 10,
            window_secs: 60,
            counter_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { used: u32 },
    Denied { used: u32 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    table: Arc<dyn RateLimitTable>,
    clock: Arc<dyn Clock>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(table: Arc<dyn RateLimitTable>, clock: Arc<dyn Clock>, policy: RateLimitPolicy) -> Self {
        Self { table, clock, policy }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    fn current_window(&self, client_ip: &str) -> RateWindow {
        RateWindow::containing(client_ip, self.clock.now(), self.policy.window_secs)
    }

    /// Reads the current window's count. Never fails: a store error admits
    /// the request.
    pub async fn check_and_reserve(&self, client_ip: &str) -> RateDecision {
        let window = self.current_window(client_ip);
        match self.table.current_count(&window).await {
            Ok(used) if used >= self.policy.max_per_window => {
                debug!(client_ip, used, "flag rate limit reached");
                RateDecision::Denied { used }
            }
            Ok(used) => RateDecision::Allowed { used },
            Err(err) => {
                warn!(client_ip, error = %err, "rate limit check failed, allowing request");
                RateDecision::Allowed { used: 0 }
            }
        }
    }

    /// Records one accepted flag in the current window.
    pub async fn consume(&self, client_ip: &str) -> DomainResult<u32> {
        let window = self.current_window(client_ip);
        let expires_at = window.window_start + self.policy.counter_ttl_secs as i64;
        self.table.increment(&window, expires_at).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use domains::testing::ManualClock;
    use domains::{DomainError, MockRateLimitTable};
    use storage_adapters::memory::MemoryRateLimitTable;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 5).unwrap()))
    }

    #[tokio::test]
    async fn eleventh_flag_in_a_window_is_denied() {
        let clock = clock();
        let limiter = RateLimiter::new(
            Arc::new(MemoryRateLimitTable::new()),
            clock.clone(),
            RateLimitPolicy::default(),
        );

        for i in 0..10 {
            assert_eq!(
                limiter.check_and_reserve("1.2.3.4").await,
                RateDecision::Allowed { used: i }
            );
            assert_eq!(limiter.consume("1.2.3.4").await.unwrap(), i + 1);
        }
        assert_eq!(
            limiter.check_and_reserve("1.2.3.4").await,
            RateDecision::Denied { used: 10 }
        );

        // Other clients have their own counters.
        assert!(limiter.check_and_reserve("5.6.7.8").await.is_allowed());
    }

    #[tokio::test]
    async fn next_window_starts_fresh() {
        let clock = clock();
        let limiter = RateLimiter::new(
            Arc::new(MemoryRateLimitTable::new()),
            clock.clone(),
            RateLimitPolicy::default(),
        );
        for _ in 0..10 {
            limiter.consume("1.2.3.4").await.unwrap();
        }
        assert!(!limiter.check_and_reserve("1.2.3.4").await.is_allowed());

        clock.advance(Duration::seconds(60));
        assert!(limiter.check_and_reserve("1.2.3.4").await.is_allowed());
    }

    #[tokio::test]
    async fn check_fails_open_on_store_error() {
        let mut table = MockRateLimitTable::new();
        table
            .expect_current_count()
            .returning(|_| Err(DomainError::store("timeout")));
        let limiter = RateLimiter::new(Arc::new(table), clock(), RateLimitPolicy::default());

        assert_eq!(
            limiter.check_and_reserve("1.2.3.4").await,
            RateDecision::Allowed { used: 0 }
        );
    }

    #[tokio::test]
    async fn consume_surfaces_store_error_and_sets_expiry() {
        let mut table = MockRateLimitTable::new();
        table
            .expect_increment()
            .withf(|window, expires_at| *expires_at == window.window_start + 3600)
            .returning(|_, _| Err(DomainError::store("throttled")));
        let limiter = RateLimiter::new(Arc::new(table), clock(), RateLimitPolicy::default());

        assert!(limiter.consume("1.2.3.4").await.unwrap_err().is_retryable());
    }
}
