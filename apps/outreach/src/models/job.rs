use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One job posting pulled out of a listing page.
///
/// The model is asked for `{role, experience, skills, description}` but nothing
/// guarantees it complies, so every field is lenient: missing or null becomes
/// empty, numbers and booleans become their text form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    #[serde(default, deserialize_with = "lenient_string")]
    pub role: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub experience: String,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
}

impl JobPosting {
    /// Text used to look up matching portfolio entries: role and description,
    /// space-joined and trimmed. Empty when the posting carries neither.
    pub fn query_text(&self) -> String {
        format!("{} {}", self.role, self.description)
            .trim()
            .to_string()
    }
}

/// A job paired with the portfolio links ranked most relevant to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub job: JobPosting,
    pub links: Vec<String>,
}

/// One matched link, tagged with the index of the job it was matched for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioLink {
    pub job_index: usize,
    pub link: String,
}

/// Flattens per-job matches into `(job_index, link)` pairs, preserving job order
/// and rank order within each job. Duplicates across jobs are kept.
pub fn flatten_links(matches: &[MatchResult]) -> Vec<PortfolioLink> {
    matches
        .iter()
        .enumerate()
        .flat_map(|(job_index, m)| {
            m.links.iter().map(move |link| PortfolioLink {
                job_index,
                link: link.clone(),
            })
        })
        .collect()
}

/// Composed outreach email. `body` is the model's text verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
    pub links_used: BTreeSet<String>,
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        // A list where a string was expected: join it rather than drop it.
        Value::Array(items) => items
            .into_iter()
            .filter_map(value_to_text)
            .collect::<Vec<_>>()
            .join(", "),
        other => value_to_text(other).unwrap_or_default(),
    })
}

fn lenient_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(value_to_text)
            .filter(|s| !s.trim().is_empty())
            .collect(),
        other => value_to_text(other)
            .filter(|s| !s.trim().is_empty())
            .map(|s| vec![s])
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_posting_deserializes() {
        let json = r#"{"role":"Engineer","experience":"3y","skills":["Go","SQL"],"description":"Build APIs"}"#;
        let job: JobPosting = serde_json::from_str(json).unwrap();
        assert_eq!(job.role, "Engineer");
        assert_eq!(job.experience, "3y");
        assert_eq!(job.skills, vec!["Go", "SQL"]);
        assert_eq!(job.description, "Build APIs");
    }

    #[test]
    fn test_missing_and_null_fields_default_to_empty() {
        let job: JobPosting = serde_json::from_str(r#"{"role": null}"#).unwrap();
        assert_eq!(job, JobPosting::default());
    }

    #[test]
    fn test_scalar_fields_are_coerced_to_text() {
        let job: JobPosting =
            serde_json::from_str(r#"{"role":"SRE","experience":5,"skills":"Rust"}"#).unwrap();
        assert_eq!(job.experience, "5");
        assert_eq!(job.skills, vec!["Rust"]);
    }

    #[test]
    fn test_nested_values_in_skills_are_dropped() {
        let job: JobPosting =
            serde_json::from_str(r#"{"skills":["Go", {"name":"x"}, null, "", 3]}"#).unwrap();
        assert_eq!(job.skills, vec!["Go", "3"]);
    }

    #[test]
    fn test_query_text_is_trimmed_join_of_role_and_description() {
        let job = JobPosting {
            role: "Backend Engineer".to_string(),
            description: "distributed systems".to_string(),
            ..Default::default()
        };
        assert_eq!(job.query_text(), "Backend Engineer distributed systems");

        let role_only = JobPosting {
            role: "  Designer ".to_string(),
            ..Default::default()
        };
        assert_eq!(role_only.query_text(), "Designer");

        assert_eq!(JobPosting::default().query_text(), "");
    }

    #[test]
    fn test_flatten_links_keeps_job_order_and_duplicates() {
        let matches = vec![
            MatchResult {
                job: JobPosting::default(),
                links: vec!["https://a".to_string(), "https://b".to_string()],
            },
            MatchResult {
                job: JobPosting::default(),
                links: vec![],
            },
            MatchResult {
                job: JobPosting::default(),
                links: vec!["https://a".to_string()],
            },
        ];

        let flat = flatten_links(&matches);

        assert_eq!(
            flat,
            vec![
                PortfolioLink { job_index: 0, link: "https://a".to_string() },
                PortfolioLink { job_index: 0, link: "https://b".to_string() },
                PortfolioLink { job_index: 2, link: "https://a".to_string() },
            ]
        );
    }
}
