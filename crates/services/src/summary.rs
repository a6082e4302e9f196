//! # SummaryAggregator
//!
//! Today / this-week counts over a page of flags, plus the ordering every
//! listing applies before display.

use chrono::{DateTime, Duration, Utc};
use domains::{format_timestamp, FlagRecord};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagSummary {
    pub total: usize,
    /// Same UTC calendar day as `retrieved_at`.
    pub today: usize,
    /// Within seven days of `retrieved_at`, today included.
    pub this_week: usize,
    pub retrieved_at: String,
}

/// Records with an unparseable `flagged_at` count toward `total` only.
pub fn summarize(records: &[FlagRecord], now: DateTime<Utc>) -> FlagSummary {
    let week = Duration::days(7);
    let mut today = 0;
    let mut this_week = 0;

    for flagged_at in records.iter().filter_map(FlagRecord::flagged_at_utc) {
        if flagged_at.date_naive() == now.date_naive() {
            today += 1;
        }
        if now - flagged_at <= week {
            this_week += 1;
        }
    }

    FlagSummary {
        total: records.len(),
        today,
        this_week,
        retrieved_at: format_timestamp(now),
    }
}

/// Newest first; records without a usable timestamp go last.
pub fn sort_newest_first(records: &mut [FlagRecord]) {
    // `None` orders below every `Some`, so descending puts it last.
    records.sort_by_cached_key(|record| std::cmp::Reverse(record.flagged_at_utc()));
}
