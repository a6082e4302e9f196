use std::sync::Arc;

use services::{FlagLister, FlagService};

use crate::metrics::FlagMetrics;

/// Shared across handlers; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub flags: FlagService,
    pub lister: FlagLister,
    pub metrics: Arc<FlagMetrics>,
}

impl AppState {
    pub fn new(flags: FlagService, lister: FlagLister) -> Self {
        Self {
            flags,
            lister,
            metrics: Arc::new(FlagMetrics::new()),
        }
    }
}
