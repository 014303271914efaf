//! Structured extraction: page text in, job postings out, via one model call.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{strip_json_fences, LanguageModel, LlmError};
use crate::models::job::JobPosting;
use crate::outreach::prompts::EXTRACT_PROMPT_TEMPLATE;

#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The model could not be reached or refused the call.
    #[error("Extraction LLM call failed: {0}")]
    Llm(#[from] LlmError),

    /// The model answered, but not with usable JSON.
    #[error("Model output is not a job list: {0}")]
    Malformed(String),
}

pub struct StructuredExtractor {
    llm: Arc<dyn LanguageModel>,
}

impl StructuredExtractor {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Calls the model exactly once and parses its answer into postings.
    pub async fn extract(&self, page_text: &str) -> Result<Vec<JobPosting>, ExtractionError> {
        let prompt = EXTRACT_PROMPT_TEMPLATE.replace("{page_text}", page_text);
        debug!("Extraction prompt: {} chars", prompt.len());

        let raw = self.llm.complete(&prompt, JSON_ONLY_SYSTEM).await?;
        parse_job_list(&raw)
    }
}

/// Parses model output into postings. Accepts an array of objects or a single
/// object; array elements that are not objects are skipped.
pub fn parse_job_list(raw: &str) -> Result<Vec<JobPosting>, ExtractionError> {
    let value: Value = serde_json::from_str(strip_json_fences(raw))
        .map_err(|e| ExtractionError::Malformed(e.to_string()))?;

    let items = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(ExtractionError::Malformed(format!(
                "expected a JSON array or object, got {}",
                json_kind(&other)
            )))
        }
    };

    let total = items.len();
    let jobs: Vec<JobPosting> = items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();

    if jobs.len() < total {
        warn!("Dropped {} non-object entries from extracted job list", total - jobs.len());
    }
    Ok(jobs)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
