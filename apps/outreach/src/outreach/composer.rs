//! Email composition: one model call per draft, output passed through as-is.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::llm_client::{LanguageModel, LlmError};
use crate::models::job::{EmailDraft, JobPosting};
use crate::outreach::prompts::{EMAIL_PROMPT_TEMPLATE, SENDER_PERSONA};

pub struct EmailComposer {
    llm: Arc<dyn LanguageModel>,
}

impl EmailComposer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Drafts an email for `job` offering `links` as portfolio evidence.
    ///
    /// The model's text becomes the body verbatim. The requested structure
    /// (subject, greeting, signature...) is not checked; `subject` is only
    /// filled when the draft happens to open with a `Subject:` line.
    pub async fn compose(&self, job: &JobPosting, links: &[String]) -> Result<EmailDraft, LlmError> {
        let prompt = build_email_prompt(job, links)?;
        debug!("Email prompt: {} chars, {} candidate links", prompt.len(), links.len());

        let body = self.llm.complete(&prompt, "").await?;

        Ok(EmailDraft {
            subject: subject_line(&body).unwrap_or_default(),
            links_used: links
                .iter()
                .filter(|link| mentions_link(&body, link))
                .cloned()
                .collect::<BTreeSet<_>>(),
            body,
        })
    }
}

fn build_email_prompt(job: &JobPosting, links: &[String]) -> Result<String, LlmError> {
    let job_description = serde_json::to_string_pretty(job)?;
    let link_list = if links.is_empty() {
        "(no portfolio links available)".to_string()
    } else {
        links
            .iter()
            .map(|l| format!("- {l}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    // Scraped job text goes in last so placeholders inside it stay literal.
    Ok(EMAIL_PROMPT_TEMPLATE
        .replace("{sender_persona}", SENDER_PERSONA)
        .replace("{link_list}", &link_list)
        .replace("{job_description}", &job_description))
}

/// True when `link` appears in `body` as a whole URL: the match must end the
/// text or be followed by whitespace or a closing delimiter, optionally after
/// sentence punctuation.
fn mentions_link(body: &str, link: &str) -> bool {
    body.match_indices(link).any(|(start, _)| {
        let after = body[start + link.len()..]
            .trim_start_matches(|c| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'));
        after.chars().next().map_or(true, |c| {
            c.is_whitespace() || matches!(c, ')' | '>' | ']' | '"' | '\'')
        })
    })
}

/// Text after the first `Subject:` label, tolerating markdown emphasis and
/// headings around the label.
fn subject_line(body: &str) -> Option<String> {
    body.lines()
        .map(|line| line.trim().trim_start_matches('#').trim_matches('*').trim())
        .find_map(|line| {
            let (label, rest) = line.split_once(':')?;
            if label.trim_matches('*').trim().eq_ignore_ascii_case("subject") {
                let subject = rest.trim().trim_matches('*').trim();
                (!subject.is_empty()).then(|| subject.to_string())
            } else {
                None
            }
        })
}
