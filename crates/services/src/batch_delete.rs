//! # BatchDeleter
//!
//! Removes flags hash by hash. Every hash gets its own outcome; a failing
//! hash never stops the rest of the batch.

use domains::TileHash;
use serde::Serialize;
use tracing::warn;

use crate::flag_store::FlagStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStatus {
    Deleted,
    NotFound,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDetail {
    pub tile_hash: String,
    pub status: DeleteStatus,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub requested: usize,
    pub deleted: usize,
    /// Not-found and errored hashes together.
    pub failed: usize,
    /// In input order.
    pub details: Vec<DeleteDetail>,
}

impl DeleteReport {
    fn record(&mut self, tile_hash: &str, status: DeleteStatus, message: impl Into<String>) {
        match status {
            DeleteStatus::Deleted => self.deleted += 1,
            DeleteStatus::NotFound | DeleteStatus::Error => self.failed += 1,
        }
        self.details.push(DeleteDetail {
            tile_hash: tile_hash.to_string(),
            status,
            message: message.into(),
        });
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

#[derive(Clone)]
pub struct BatchDeleter {
    store: FlagStore,
}

impl BatchDeleter {
    pub fn new(store: FlagStore) -> Self {
        Self { store }
    }

    /// Duplicates are processed again; the second pass reports `not_found`.
    pub async fn delete_flags(&self, tile_hashes: &[String]) -> DeleteReport {
        let mut report = DeleteReport {
            requested: tile_hashes.len(),
            ..DeleteReport::default()
        };

        for raw in tile_hashes {
            let tile_hash = match TileHash::parse(raw) {
                Ok(hash) => hash,
                Err(err) => {
                    report.record(raw, DeleteStatus::Error, err.to_string());
                    continue;
                }
            };

            match self.store.get(&tile_hash).await {
                Ok(None) => {
                    report.record(raw, DeleteStatus::NotFound, "Tile not found in database");
                }
                Ok(Some(_)) => match self.store.remove(&tile_hash).await {
                    Ok(()) => report.record(raw, DeleteStatus::Deleted, "Successfully deleted"),
                    Err(err) => {
                        warn!(%tile_hash, error = %err, "flag delete failed");
                        report.record(raw, DeleteStatus::Error, err.to_string());
                    }
                },
                Err(err) => {
                    warn!(%tile_hash, error = %err, "flag lookup failed");
                    report.record(raw, DeleteStatus::Error, err.to_string());
                }
            }
        }

        report
    }
}
