//! # api-adapters
//!
//! HTTP surface for the flag engine. The axum router and handlers are
//! compiled with the `web-axum` feature; metrics are always available.

pub mod metrics;

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod extract;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod routes;
#[cfg(feature = "web-axum")]
pub mod state;

pub use metrics::{FlagMetrics, Operation, Outcome};

#[cfg(feature = "web-axum")]
pub use error::{ApiError, ApiResult};
#[cfg(feature = "web-axum")]
pub use routes::build_router;
#[cfg(feature = "web-axum")]
pub use state::AppState;
