//! Shared wiring for the scenario tests: memory adapters behind the real
//! services, with a clock the tests can move.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use domains::testing::ManualClock;
use services::{
    FlagLister, FlagService, FlagStore, RateLimitPolicy, RateLimiter, ReviewAction, ReviewConsole,
    ReviewEvent,
};
use storage_adapters::memory::{MemoryFlagTable, MemoryRateLimitTable};

pub fn start_of_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub flags: Arc<MemoryFlagTable>,
    pub counters: Arc<MemoryRateLimitTable>,
    pub store: FlagStore,
    pub service: FlagService,
    pub lister: FlagLister,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(RateLimitPolicy::default())
    }

    pub fn with_policy(policy: RateLimitPolicy) -> Self {
        let clock = Arc::new(ManualClock::new(start_of_day()));
        let flags = Arc::new(MemoryFlagTable::new());
        let counters = Arc::new(MemoryRateLimitTable::new());

        let store = FlagStore::new(flags.clone(), clock.clone());
        let limiter = RateLimiter::new(counters.clone(), clock.clone(), policy);
        Self {
            service: FlagService::new(store.clone(), limiter),
            lister: FlagLister::new(store.clone(), clock.clone()),
            clock,
            flags,
            counters,
            store,
        }
    }
}

/// Plays back a fixed list of answers and records everything shown.
#[derive(Default)]
pub struct ScriptedConsole {
    actions: VecDeque<ReviewAction>,
    confirmations: VecDeque<bool>,
    pub shown: Vec<String>,
}

impl ScriptedConsole {
    pub fn new(actions: &[ReviewAction], confirmations: &[bool]) -> Self {
        Self {
            actions: actions.iter().copied().collect(),
            confirmations: confirmations.iter().copied().collect(),
            shown: Vec::new(),
        }
    }
}

#[async_trait]
impl ReviewConsole for ScriptedConsole {
    async fn next_action(&mut self) -> Option<ReviewAction> {
        self.actions.pop_front()
    }

    async fn confirm(&mut self, _question: &str) -> Option<bool> {
        self.confirmations.pop_front()
    }

    fn show(&mut self, event: ReviewEvent<'_>) {
        self.shown.push(format!("{event:?}"));
    }
}
