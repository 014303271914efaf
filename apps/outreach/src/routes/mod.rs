pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::outreach::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/outreach", post(handlers::handle_outreach))
        .route("/api/v1/portfolio", get(handlers::handle_list_portfolio))
        .with_state(state)
}
