// Prompt template for the match analysis call.
// `{resume}` receives the retrieved context (not the full resume), `{jd}` the job description.

use crate::retrieval::SearchHit;

/// Analysis prompt. Substitute with [`format_analysis_prompt`], never with chained `replace`.
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Score this resume for the job (0-100). List 2-3 missing skills and suggestions. Return JSON only.

Resume: {resume}

Job: {jd}

JSON: {"score": 0, "missing_skills": [], "suggestions": [], "rewritten_bullets": []}"#;

const PLACEHOLDERS: [&str; 2] = ["resume", "jd"];

/// Fills the template in a single pass, so placeholder-like text inside the
/// resume or job description is never expanded.
pub fn format_analysis_prompt(context: &str, job_description: &str) -> String {
    render(ANALYSIS_PROMPT_TEMPLATE, |name| match name {
        "resume" => Some(context),
        "jd" => Some(job_description),
        _ => None,
    })
}

fn render<'a>(template: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let substituted = PLACEHOLDERS.iter().find_map(|name| {
            after
                .strip_prefix(name)
                .and_then(|tail| tail.strip_prefix('}'))
                .and_then(|tail| lookup(name).map(|value| (value, tail)))
        });
        match substituted {
            Some((value, tail)) => {
                out.push_str(value);
                rest = tail;
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Joins retrieved chunks (best first) with newlines, optionally capped at
/// `max_words` whitespace tokens. The cut falls inside the last chunk that fits.
pub fn build_context(hits: &[SearchHit], max_words: Option<usize>) -> String {
    let Some(mut remaining) = max_words else {
        return hits
            .iter()
            .map(|h| h.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
    };

    let mut lines = Vec::new();
    for hit in hits {
        if remaining == 0 {
            break;
        }
        let words: Vec<&str> = hit.chunk.text.split_whitespace().collect();
        if words.len() <= remaining {
            remaining -= words.len();
            lines.push(words.join(" "));
        } else {
            lines.push(words[..remaining].join(" "));
            remaining = 0;
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::chunker::Chunk;

    fn hit(index: usize, text: &str) -> SearchHit {
        SearchHit {
            chunk: Chunk {
                index,
                text: text.to_string(),
            },
            distance: index as f32,
        }
    }

    #[test]
    fn test_prompt_substitutes_both_placeholders() {
        let prompt = format_analysis_prompt("Built APIs in Rust", "Backend engineer, Rust");
        assert!(prompt.contains("Resume: Built APIs in Rust"));
        assert!(prompt.contains("Job: Backend engineer, Rust"));
        assert!(!prompt.contains("{resume}"));
        assert!(!prompt.contains("{jd}"));
    }

    #[test]
    fn test_prompt_keeps_schema_example() {
        let prompt = format_analysis_prompt("x", "y");
        assert!(prompt.ends_with(
            r#"JSON: {"score": 0, "missing_skills": [], "suggestions": [], "rewritten_bullets": []}"#
        ));
    }

    #[test]
    fn test_placeholder_text_in_inputs_is_not_expanded() {
        let prompt = format_analysis_prompt("mentions {jd} literally", "asks for {resume}");
        assert!(prompt.contains("Resume: mentions {jd} literally"));
        assert!(prompt.contains("Job: asks for {resume}"));
    }

    #[test]
    fn test_build_context_joins_with_newlines() {
        let hits = vec![hit(2, "led migration"), hit(0, "wrote sql")];
        assert_eq!(build_context(&hits, None), "led migration\nwrote sql");
    }

    #[test]
    fn test_build_context_truncates_to_word_budget() {
        let hits = vec![hit(0, "one two three"), hit(1, "four five six"), hit(2, "seven")];
        assert_eq!(build_context(&hits, Some(5)), "one two three\nfour five");
        assert_eq!(build_context(&hits, Some(3)), "one two three");
        assert_eq!(build_context(&hits, Some(0)), "");
    }

    #[test]
    fn test_build_context_empty() {
        assert_eq!(build_context(&[], None), "");
        assert_eq!(build_context(&[], Some(10)), "");
    }
}
