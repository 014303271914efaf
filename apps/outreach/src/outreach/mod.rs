// Outreach pipeline: structured job extraction, portfolio link matching, and
// email composition. All model calls go through llm_client.

pub mod composer;
pub mod extractor;
pub mod handlers;
pub mod matcher;
pub mod pipeline;
pub mod prompts;
