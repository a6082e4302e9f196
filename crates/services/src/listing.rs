//! # Flag listing
//!
//! One page of flagged records, re-sorted and summarised, with the
//! continuation token for the next page.

use std::sync::Arc;

use domains::{Clock, DomainResult, FlagRecord};
use serde::Serialize;

use crate::cursor::PaginationCursor;
use crate::flag_store::FlagStore;
use crate::summary::{sort_newest_first, summarize, FlagSummary};

pub const DEFAULT_LIST_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagListing {
    /// Newest first.
    pub flags: Vec<FlagRecord>,
    /// Items the store evaluated; can exceed `flags.len()`.
    pub scanned_count: usize,
    pub next_cursor: Option<String>,
    pub summary: FlagSummary,
    /// Set when the supplied cursor was unusable and the scan restarted.
    pub cursor_warning: Option<String>,
}

impl FlagListing {
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }

    pub fn body(&self) -> ListingBody<'_> {
        ListingBody {
            flags: self.flags.iter().map(FlagView::from).collect(),
            count: self.flags.len(),
            scanned_count: self.scanned_count,
            has_more: self.has_more(),
            next_key: self.next_cursor.as_deref(),
            summary: &self.summary,
            warning: self.cursor_warning.as_deref(),
        }
    }
}

/// Public shape of a flag. The flagger's address is never included.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagView<'a> {
    pub tile_hash: &'a str,
    pub tile_path: &'a str,
    pub flagged_at: Option<&'a str>,
    pub flag_status: &'static str,
    pub ttl: Option<i64>,
}

impl<'a> From<&'a FlagRecord> for FlagView<'a> {
    fn from(record: &'a FlagRecord) -> Self {
        Self {
            tile_hash: record.tile_hash.as_str(),
            tile_path: &record.tile_path,
            flagged_at: record.flagged_at.as_deref(),
            flag_status: record.flag_status.as_str(),
            ttl: record.ttl,
        }
    }
}

/// Wire form of a listing, shared by the admin API and `flagctl list --format json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingBody<'a> {
    pub flags: Vec<FlagView<'a>>,
    pub count: usize,
    pub scanned_count: usize,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_key: Option<&'a str>,
    pub summary: &'a FlagSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<&'a str>,
}

#[derive(Clone)]
pub struct FlagLister {
    store: FlagStore,
    clock: Arc<dyn Clock>,
}

impl FlagLister {
    pub fn new(store: FlagStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// `limit` defaults to 100 and is capped at 1000.
    pub async fn list(&self, limit: Option<u32>, cursor: Option<&str>) -> DomainResult<FlagListing> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
        let (start, cursor_warning) = PaginationCursor::decode_or_restart(cursor);

        let page = self.store.scan_flagged(limit, start).await?;
        let mut flags = page.records;
        sort_newest_first(&mut flags);
        let summary = summarize(&flags, self.clock.now());

        Ok(FlagListing {
            flags,
            scanned_count: page.scanned_count,
            next_cursor: page.last_evaluated_key.as_ref().map(PaginationCursor::encode),
            summary,
            cursor_warning,
        })
    }
}
