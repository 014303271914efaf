//! Link matching: top portfolio links for each extracted job.

use std::sync::Arc;

use tracing::debug;

use crate::models::job::{JobPosting, MatchResult};
use crate::portfolio::index::{IndexError, PortfolioSearch};

/// Links returned per job.
pub const LINKS_PER_JOB: usize = 2;

pub struct LinkMatcher {
    index: Arc<dyn PortfolioSearch>,
}

impl LinkMatcher {
    pub fn new(index: Arc<dyn PortfolioSearch>) -> Self {
        Self { index }
    }

    /// One `MatchResult` per job, in input order. Jobs with neither a role nor a
    /// description get no links and never reach the index.
    pub async fn match_jobs(&self, jobs: &[JobPosting]) -> Result<Vec<MatchResult>, IndexError> {
        let mut results = Vec::with_capacity(jobs.len());

        for (i, job) in jobs.iter().enumerate() {
            let query = job.query_text();
            let links = if query.is_empty() {
                debug!("Job {i} has no role or description; skipping portfolio lookup");
                Vec::new()
            } else {
                let hits = self.index.query(&query, LINKS_PER_JOB).await?;
                debug!(
                    "Job {i}: {:?}",
                    hits.iter()
                        .map(|h| format!("{} ({:.3})", h.link, h.score))
                        .collect::<Vec<_>>()
                );
                hits.into_iter().map(|hit| hit.link).collect()
            };

            results.push(MatchResult {
                job: job.clone(),
                links,
            });
        }

        Ok(results)
    }
}
