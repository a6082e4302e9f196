//! # services
//!
//! The flag lifecycle engine: creation and removal, rate limiting, listing
//! with cursors and summaries, batch deletion and the interactive review
//! state machine. Everything here is written against `domains` ports.

pub mod batch_delete;
pub mod client_ip;
pub mod cursor;
pub mod flag_store;
pub mod flagging;
pub mod listing;
pub mod rate_limiter;
pub mod review;
pub mod summary;

pub use batch_delete::{BatchDeleter, DeleteDetail, DeleteReport, DeleteStatus};
pub use client_ip::client_ip;
pub use cursor::PaginationCursor;
pub use flag_store::{CreateOutcome, FlagLookup, FlagStore};
pub use flagging::FlagService;
pub use listing::{FlagLister, FlagListing, FlagView, ListingBody, DEFAULT_LIST_LIMIT};
pub use rate_limiter::{RateDecision, RateLimitPolicy, RateLimiter};
pub use review::{
    ReviewAction, ReviewConsole, ReviewEvent, ReviewOutcome, ReviewReport, ReviewSession,
    ReviewTally,
};
pub use summary::{sort_newest_first, summarize, FlagSummary};
