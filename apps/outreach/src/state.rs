use std::sync::Arc;

use crate::models::portfolio::PortfolioEntry;
use crate::outreach::pipeline::Pipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Read-only copy of the indexed catalog, for listing.
    pub portfolio: Arc<Vec<PortfolioEntry>>,
}
