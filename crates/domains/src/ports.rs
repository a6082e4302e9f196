//! # Ports
//!
//! Contracts for the key-value store, the clock and the reviewer's local
//! filesystem. Adapters live in `storage-adapters`.

use std::io;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainResult;
use crate::models::{FlagRecord, FlagStatus, RateWindow, TileHash};

/// Largest key set a single native batch-get accepts.
pub const NATIVE_BATCH_GET_LIMIT: usize = 100;

/// The store's native "last evaluated key" for a flag-table scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanKey {
    pub tile_hash: String,
}

/// Parameters for one page of a filtered scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub status: FlagStatus,
    /// Items the store evaluates before filtering.
    pub limit: u32,
    pub exclusive_start: Option<ScanKey>,
}

/// One page of a filtered scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Matching records in native scan order.
    pub records: Vec<FlagRecord>,
    /// Present iff the scan stopped before the end of the table.
    pub last_evaluated_key: Option<ScanKey>,
    /// Items evaluated before filtering; may exceed `records.len()`.
    pub scanned_count: usize,
}

/// Result of a single native batch-get call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchGetPage {
    pub records: Vec<FlagRecord>,
    /// Keys the store declined to process in this call.
    pub unprocessed: Vec<TileHash>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    AlreadyExists,
}

/// The flag table: point-get, conditional put, batch-get, delete and scan.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait FlagTable: Send + Sync {
    async fn get(&self, tile_hash: &TileHash) -> DomainResult<Option<FlagRecord>>;

    /// Inserts only when no record exists for the key, as one atomic write.
    async fn put_if_absent(&self, record: &FlagRecord) -> DomainResult<PutOutcome>;

    /// Callers never pass more than [`NATIVE_BATCH_GET_LIMIT`] keys.
    async fn batch_get(&self, tile_hashes: &[TileHash]) -> DomainResult<BatchGetPage>;

    /// Deleting an absent key succeeds.
    async fn delete(&self, tile_hash: &TileHash) -> DomainResult<()>;

    async fn scan(&self, request: ScanRequest) -> DomainResult<ScanPage>;
}

/// Per-client counters for fixed rate-limit windows.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RateLimitTable: Send + Sync {
    /// Zero when the window has no counter yet.
    async fn current_count(&self, window: &RateWindow) -> DomainResult<u32>;

    /// Atomically adds one, creating the counter with `expires_at` if absent.
    /// Returns the new count.
    async fn increment(&self, window: &RateWindow, expires_at: i64) -> DomainResult<u32>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Tile assets on the reviewer's machine.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait LocalTiles: Send + Sync {
    fn exists(&self, path: &str) -> bool;

    /// Hands the file to the platform's default viewer and waits for the
    /// launcher to exit.
    async fn open_in_viewer(&self, path: &str) -> io::Result<()>;

    fn delete(&self, path: &str) -> io::Result<()>;
}
