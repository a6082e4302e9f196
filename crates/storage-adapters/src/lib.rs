//! # storage-adapters
//!
//! Implementations of the `domains` ports. The in-memory tables are always
//! compiled; the DynamoDB and Redis backends sit behind features.

pub mod local_tiles;
pub mod memory;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

#[cfg(feature = "redis")]
pub mod redis;

pub use local_tiles::DesktopTiles;
pub use memory::{MemoryFlagTable, MemoryRateLimitTable};
