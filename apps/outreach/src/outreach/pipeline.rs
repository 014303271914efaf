//! Outreach pipeline: fetch -> extract -> match -> compose.
//!
//! Failure policy per stage:
//! - fetch errors are fatal and surface to the caller;
//! - malformed extraction output degrades to an empty job list, which ends the
//!   run with no draft (a valid, empty result);
//! - model transport errors in either call are fatal;
//! - the composed draft is passed through unchecked.
//!
//! Only the first extracted job gets an email. Links for every job are still
//! returned, and all of them are offered to the composer as candidates.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::fetch::fetcher::{FetchError, PageFetcher};
use crate::llm_client::{LanguageModel, LlmError};
use crate::models::job::{flatten_links, EmailDraft, JobPosting, PortfolioLink};
use crate::outreach::composer::EmailComposer;
use crate::outreach::extractor::{ExtractionError, StructuredExtractor};
use crate::outreach::matcher::LinkMatcher;
use crate::portfolio::index::{IndexError, PortfolioSearch};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Page fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Portfolio lookup failed: {0}")]
    Index(#[from] IndexError),
}

/// Last stage a run reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Fetched,
    Extracted,
    Matched,
    Composed,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutreachResult {
    pub stage: PipelineStage,
    pub jobs: Vec<JobPosting>,
    pub portfolio_links: Vec<PortfolioLink>,
    pub email: Option<EmailDraft>,
}

pub struct Pipeline {
    fetcher: Arc<dyn PageFetcher>,
    extractor: StructuredExtractor,
    matcher: LinkMatcher,
    composer: EmailComposer,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        llm: Arc<dyn LanguageModel>,
        index: Arc<dyn PortfolioSearch>,
    ) -> Self {
        Self {
            fetcher,
            extractor: StructuredExtractor::new(llm.clone()),
            matcher: LinkMatcher::new(index),
            composer: EmailComposer::new(llm),
        }
    }

    pub async fn run(&self, url: &str) -> Result<OutreachResult, PipelineError> {
        let page_text = self.fetcher.fetch(url).await?;
        info!(stage = ?PipelineStage::Fetched, "{} chars from {}", page_text.len(), url);

        let jobs = match self.extractor.extract(&page_text).await {
            Ok(jobs) => jobs,
            Err(ExtractionError::Malformed(reason)) => {
                warn!("Extraction output unusable, treating as no jobs: {reason}");
                Vec::new()
            }
            Err(ExtractionError::Llm(e)) => return Err(e.into()),
        };
        info!(stage = ?PipelineStage::Extracted, "{} job postings", jobs.len());

        let Some(first_job) = jobs.first().cloned() else {
            return Ok(OutreachResult {
                stage: PipelineStage::Extracted,
                jobs,
                portfolio_links: Vec::new(),
                email: None,
            });
        };

        let matches = self.matcher.match_jobs(&jobs).await?;
        let portfolio_links = flatten_links(&matches);
        info!(
            stage = ?PipelineStage::Matched,
            "{} portfolio links across {} jobs",
            portfolio_links.len(),
            matches.len()
        );

        if jobs.len() > 1 {
            info!(
                "Page lists {} jobs; composing for the first only ({:?})",
                jobs.len(),
                first_job.role
            );
        }
        let candidates = unique_links(&portfolio_links);
        let email = self.composer.compose(&first_job, &candidates).await?;
        info!(
            stage = ?PipelineStage::Composed,
            "draft of {} chars, {} links referenced",
            email.body.len(),
            email.links_used.len()
        );

        Ok(OutreachResult {
            stage: PipelineStage::Composed,
            jobs,
            portfolio_links,
            email: Some(email),
        })
    }
}

/// Distinct links in first-seen order.
fn unique_links(links: &[PortfolioLink]) -> Vec<String> {
    let mut seen = HashSet::new();
    links
        .iter()
        .filter(|l| seen.insert(l.link.as_str()))
        .map(|l| l.link.clone())
        .collect()
}
