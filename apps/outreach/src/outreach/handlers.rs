//! Axum route handlers for the Outreach API.

use std::collections::BTreeSet;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::job::{JobPosting, PortfolioLink};
use crate::models::portfolio::PortfolioEntry;
use crate::outreach::pipeline::PipelineStage;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OutreachRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct OutreachResponse {
    /// Draft text; empty when the page yielded no jobs.
    pub email_content: String,
    pub subject: String,
    pub links_used: BTreeSet<String>,
    pub stage: PipelineStage,
    pub jobs: Vec<JobPosting>,
    pub portfolio_links: Vec<PortfolioLink>,
}

#[derive(Debug, Serialize)]
pub struct PortfolioResponse {
    pub count: usize,
    pub entries: Vec<PortfolioEntry>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/outreach
///
/// Runs the full pipeline for one job-listing URL.
pub async fn handle_outreach(
    State(state): State<AppState>,
    Json(request): Json<OutreachRequest>,
) -> Result<Json<OutreachResponse>, AppError> {
    let url = request.url.trim();
    if url.is_empty() {
        return Err(AppError::Validation("url cannot be empty".to_string()));
    }

    let result = state.pipeline.run(url).await?;
    let email = result.email.unwrap_or_default();

    Ok(Json(OutreachResponse {
        email_content: email.body,
        subject: email.subject,
        links_used: email.links_used,
        stage: result.stage,
        jobs: result.jobs,
        portfolio_links: result.portfolio_links,
    }))
}

/// GET /api/v1/portfolio
///
/// Lists the indexed portfolio entries.
pub async fn handle_list_portfolio(State(state): State<AppState>) -> Json<PortfolioResponse> {
    Json(PortfolioResponse {
        count: state.portfolio.len(),
        entries: state.portfolio.as_ref().clone(),
    })
}
