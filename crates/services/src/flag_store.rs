//! # FlagStore
//!
//! Owns the flag record lifecycle on top of a [`FlagTable`]. Creation is a
//! single conditional insert so concurrent flaggers of one tile race inside
//! the store, not here.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Duration;
use domains::{
    Clock, DomainError, DomainResult, FlagRecord, FlagStatus, FlagTable, PutOutcome, ScanKey,
    ScanPage, ScanRequest, TileHash, DEFAULT_FLAG_TTL_DAYS, NATIVE_BATCH_GET_LIMIT,
};
use tracing::{debug, info, warn};

/// Upper bound on items evaluated by one scan page.
pub const MAX_SCAN_LIMIT: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(FlagRecord),
    /// Another flag already exists for the tile. Expected under races.
    AlreadyFlagged,
}

/// Merged result of a batch lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagLookup {
    /// Hashes without a record are absent.
    pub flags: HashMap<TileHash, FlagRecord>,
    /// Keys the store did not process; safe to retry.
    pub unprocessed: Vec<TileHash>,
}

#[derive(Clone)]
pub struct FlagStore {
    table: Arc<dyn FlagTable>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl FlagStore {
    pub fn new(table: Arc<dyn FlagTable>, clock: Arc<dyn Clock>) -> Self {
        Self {
            table,
            clock,
            ttl: Duration::days(DEFAULT_FLAG_TTL_DAYS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn create(
        &self,
        tile_hash: TileHash,
        tile_path: &str,
        client_ip: &str,
    ) -> DomainResult<CreateOutcome> {
        let record = FlagRecord::new(tile_hash, tile_path, client_ip, self.clock.now(), self.ttl);

        match self.table.put_if_absent(&record).await? {
            PutOutcome::Inserted => {
                info!(tile_hash = %record.tile_hash, client_ip, "tile flagged");
                Ok(CreateOutcome::Created(record))
            }
            PutOutcome::AlreadyExists => {
                debug!(tile_hash = %record.tile_hash, "tile already flagged");
                Ok(CreateOutcome::AlreadyFlagged)
            }
        }
    }

    /// Idempotent: removing an absent flag succeeds.
    pub async fn remove(&self, tile_hash: &TileHash) -> DomainResult<()> {
        self.table.delete(tile_hash).await?;
        info!(%tile_hash, "tile unflagged");
        Ok(())
    }

    pub async fn get(&self, tile_hash: &TileHash) -> DomainResult<Option<FlagRecord>> {
        self.table.get(tile_hash).await
    }

    /// Looks up many hashes, splitting into native-sized calls.
    ///
    /// A chunk whose call fails is reported through `unprocessed` so the
    /// rest of the batch still resolves. The error only propagates when no
    /// chunk succeeded.
    pub async fn batch_get(&self, tile_hashes: &[TileHash]) -> DomainResult<FlagLookup> {
        let mut seen = HashSet::new();
        let unique: Vec<TileHash> = tile_hashes
            .iter()
            .filter(|hash| seen.insert(*hash))
            .cloned()
            .collect();

        let mut lookup = FlagLookup::default();
        let mut last_error = None;
        let mut succeeded = 0usize;

        for chunk in unique.chunks(NATIVE_BATCH_GET_LIMIT) {
            match self.table.batch_get(chunk).await {
                Ok(page) => {
                    succeeded += 1;
                    for record in page.records {
                        lookup.flags.insert(record.tile_hash.clone(), record);
                    }
                    lookup.unprocessed.extend(page.unprocessed);
                }
                Err(err) => {
                    warn!(keys = chunk.len(), error = %err, "batch lookup chunk failed");
                    lookup.unprocessed.extend(chunk.iter().cloned());
                    last_error = Some(err);
                }
            }
        }

        if succeeded == 0 {
            if let Some(err) = last_error {
                return Err(err);
            }
        }
        if !lookup.unprocessed.is_empty() {
            warn!(count = lookup.unprocessed.len(), "unprocessed keys in batch lookup");
        }
        Ok(lookup)
    }

    /// One page of flagged records in native scan order.
    pub async fn scan_flagged(&self, limit: u32, cursor: Option<ScanKey>) -> DomainResult<ScanPage> {
        if limit == 0 {
            return Err(DomainError::Validation("limit must be at least 1".into()));
        }
        let request = ScanRequest {
            status: FlagStatus::Flagged,
            limit: limit.min(MAX_SCAN_LIMIT),
            exclusive_start: cursor,
        };
        let page = self.table.scan(request).await?;
        debug!(
            matched = page.records.len(),
            scanned = page.scanned_count,
            more = page.last_evaluated_key.is_some(),
            "scanned flag table"
        );
        Ok(page)
    }
}
