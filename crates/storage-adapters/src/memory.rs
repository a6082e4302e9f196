//! # In-memory tables
//!
//! Process-local stand-ins for the key-value store. The flag table keeps an
//! ordered map so scans have a stable native order and resumable keys, the
//! same contract a hosted table gives.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use dashmap::DashMap;
use domains::{
    BatchGetPage, DomainError, DomainResult, FlagRecord, FlagTable, PutOutcome, RateLimitTable,
    RateWindow, ScanKey, ScanPage, ScanRequest, TileHash,
};

#[derive(Debug, Default)]
pub struct MemoryFlagTable {
    items: RwLock<BTreeMap<String, FlagRecord>>,
}

impl MemoryFlagTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a record unconditionally. Used to seed fixtures.
    pub fn insert(&self, record: FlagRecord) -> DomainResult<()> {
        self.write()?
            .insert(record.tile_hash.as_str().to_string(), record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, BTreeMap<String, FlagRecord>>> {
        self.items
            .read()
            .map_err(|_| DomainError::store("flag table lock poisoned"))
    }

    fn write(&self) -> DomainResult<RwLockWriteGuard<'_, BTreeMap<String, FlagRecord>>> {
        self.items
            .write()
            .map_err(|_| DomainError::store("flag table lock poisoned"))
    }
}

#[async_trait]
impl FlagTable for MemoryFlagTable {
    async fn get(&self, tile_hash: &TileHash) -> DomainResult<Option<FlagRecord>> {
        Ok(self.read()?.get(tile_hash.as_str()).cloned())
    }

    async fn put_if_absent(&self, record: &FlagRecord) -> DomainResult<PutOutcome> {
        let mut items = self.write()?;
        let key = record.tile_hash.as_str();
        if items.contains_key(key) {
            return Ok(PutOutcome::AlreadyExists);
        }
        items.insert(key.to_string(), record.clone());
        Ok(PutOutcome::Inserted)
    }

    async fn batch_get(&self, tile_hashes: &[TileHash]) -> DomainResult<BatchGetPage> {
        let items = self.read()?;
        let records = tile_hashes
            .iter()
            .filter_map(|hash| items.get(hash.as_str()).cloned())
            .collect();
        Ok(BatchGetPage {
            records,
            unprocessed: Vec::new(),
        })
    }

    async fn delete(&self, tile_hash: &TileHash) -> DomainResult<()> {
        self.write()?.remove(tile_hash.as_str());
        Ok(())
    }

    async fn scan(&self, request: ScanRequest) -> DomainResult<ScanPage> {
        let items = self.read()?;
        let lower = match request.exclusive_start {
            Some(ScanKey { tile_hash }) => Bound::Excluded(tile_hash),
            None => Bound::Unbounded,
        };
        let mut range = items.range::<String, _>((lower, Bound::Unbounded));

        let mut page = ScanPage::default();
        let mut last_key = None;
        for (key, record) in range.by_ref().take(request.limit as usize) {
            page.scanned_count += 1;
            last_key = Some(key.clone());
            if record.flag_status == request.status {
                page.records.push(record.clone());
            }
        }

        if range.next().is_some() {
            page.last_evaluated_key = last_key.map(|tile_hash| ScanKey { tile_hash });
        }
        Ok(page)
    }
}

/// Window counters keyed by `ip:window_start`. Expiry is only enforced by
/// [`MemoryRateLimitTable::purge_expired`]; the window key already scopes reads.
#[derive(Debug, Default)]
pub struct MemoryRateLimitTable {
    counters: DashMap<String, Counter>,
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u32,
    expires_at: i64,
}

impl MemoryRateLimitTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops counters whose expiry has passed.
    pub fn purge_expired(&self, now: i64) {
        self.counters.retain(|_, counter| counter.expires_at > now);
    }
}

#[async_trait]
impl RateLimitTable for MemoryRateLimitTable {
    async fn current_count(&self, window: &RateWindow) -> DomainResult<u32> {
        Ok(self
            .counters
            .get(&window.storage_key())
            .map(|counter| counter.count)
            .unwrap_or(0))
    }

    async fn increment(&self, window: &RateWindow, expires_at: i64) -> DomainResult<u32> {
        let mut entry = self
            .counters
            .entry(window.storage_key())
            .or_insert(Counter {
                count: 0,
                expires_at,
            });
        entry.count = entry.count.saturating_add(1);
        Ok(entry.count)
    }
}
