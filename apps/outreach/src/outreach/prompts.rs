// Prompt templates for the two model calls in the outreach pipeline.
// Placeholders are substituted with `str::replace` before sending.

/// Job extraction prompt. Replace `{page_text}` before sending.
pub const EXTRACT_PROMPT_TEMPLATE: &str = r#"### SCRAPED TEXT FROM WEBSITE:
{page_text}

### INSTRUCTION:
The scraped text is from the careers page of a website.
Extract the job postings and return them as a JSON ARRAY of objects with these keys:
- "role": job title
- "experience": required experience, as written in the posting
- "skills": array of required skills
- "description": short description of the role

Return an empty array if the page lists no job postings.
Only return valid JSON (no preamble)."#;

/// Sender identity used in every outreach email.
pub const SENDER_PERSONA: &str = "You are Md. Al-Mamun Provath, a Business Development Executive at NovaTech AI. \
NovaTech AI is an AI & Software Consulting company dedicated to facilitating seamless integration \
of business processes through automated tools. We empower enterprises with tailored solutions, \
fostering scalability, process optimization, cost reduction, and heightened efficiency.";

/// Email composition prompt.
/// Replace: {job_description}, {sender_persona}, {link_list}
pub const EMAIL_PROMPT_TEMPLATE: &str = r#"### JOB DESCRIPTION:
{job_description}

### INSTRUCTION:
{sender_persona}

Write a professional cold email to the client regarding the job above.
Include the most relevant portfolio links from this list:
{link_list}

Structure:
- Subject Line (start the first line with "Subject:")
- Greeting
- Intro + About NovaTech AI
- Relevant Experience (with clickable portfolio links)
- Call to Action
- Signature

Do not provide a preamble."#;
