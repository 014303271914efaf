//! Visible-text extraction from an HTML document.

use scraper::{Html, Node, Selector};

/// Elements whose text never reaches a reader.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// Returns the whitespace-normalised visible text of `html`, capped at
/// `max_chars` characters (on a word boundary) when a cap is given.
pub fn page_text(html: &str, max_chars: Option<usize>) -> String {
    let document = Html::parse_document(html);

    let root = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut parts: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            parts.push(text);
        }
    }

    let cleaned = clean_text(&parts.join(" "));
    match max_chars {
        Some(limit) => truncate_chars(&cleaned, limit),
        None => cleaned,
    }
}

/// Collapses all whitespace runs to single spaces.
fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncates to at most `max_chars` characters, backing off to the last space.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };
    let truncated = &text[..cut];
    match truncated.rfind(' ') {
        Some(last_space) if last_space > 0 => truncated[..last_space].to_string(),
        _ => truncated.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOB_PAGE: &str = r#"
        <!DOCTYPE html>
        <html>
        <head><title>Careers</title><style>body { color: red; }</style></head>
        <body>
            <nav>Home | Jobs</nav>
            <script>window.analytics = "should not appear";</script>
            <main>
                <h1>Senior Backend Engineer</h1>
                <p>We are looking for   an engineer
                   with 5+ years of Python.</p>
                <noscript>Enable JavaScript</noscript>
            </main>
        </body>
        </html>
    "#;

    #[test]
    fn test_page_text_keeps_visible_text_only() {
        let text = page_text(JOB_PAGE, None);

        assert!(text.contains("Senior Backend Engineer"));
        assert!(text.contains("We are looking for an engineer with 5+ years of Python."));
        assert!(text.contains("Home | Jobs"));
        assert!(!text.contains("analytics"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("Enable JavaScript"));
        assert!(!text.contains("Careers"));
    }

    #[test]
    fn test_page_text_of_empty_body_is_empty() {
        assert_eq!(page_text("<html><body>   </body></html>", None), "");
    }

    #[test]
    fn test_truncate_respects_word_boundary_and_multibyte_chars() {
        assert_eq!(truncate_chars("héllo wörld again", 9), "héllo");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdefgh", 4), "abcd");
    }
}
