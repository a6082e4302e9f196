//! # domains
//!
//! Flag records, the error taxonomy and the ports the moderation services
//! are written against. Nothing in this crate performs I/O.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::*;
pub use models::*;
pub use ports::*;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
