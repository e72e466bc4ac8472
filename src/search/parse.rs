//! Extract question/answer pairs from a knowledge-base answer blob.
//!
//! The service answers with text shaped like
//! `Question":"<q>" answer:"<a>" Question":"<q>" answer:"<a>"`. Each answer
//! runs until the next `Question` marker or the end of the text.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub question: String,
    pub answer: String,
}

fn marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r#"(?s)Question"\s*:\s*"(.*?)"\s*answer\s*:\s*""#).expect("valid regex"))
}

/// Parse every question/answer pair in order; pairs with an empty question
/// or answer are dropped.
#[must_use]
pub fn parse_results(answer: &str) -> Vec<SearchResult> {
    let markers: Vec<_> = marker().captures_iter(answer).collect();
    markers
        .iter()
        .enumerate()
        .filter_map(|(i, caps)| {
            let whole = caps.get(0)?;
            let question = caps.get(1)?.as_str().trim();
            let end = markers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(answer.len(), |m| m.start());
            let body = answer[whole.end()..end].trim();
            let body = body.strip_suffix('"').unwrap_or(body).trim();
            (!question.is_empty() && !body.is_empty())
                .then(|| SearchResult { question: question.to_string(), answer: body.to_string() })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(question: &str, answer: &str) -> SearchResult {
        SearchResult { question: question.into(), answer: answer.into() }
    }

    #[test]
    fn two_results_in_order() {
        let text = r#"Question":"What is X?" answer:"X is Y" Question":"How?" answer:"Like this""#;
        assert_eq!(parse_results(text), vec![pair("What is X?", "X is Y"), pair("How?", "Like this")]);
    }

    #[test]
    fn answers_may_span_lines() {
        let text = "Question\":\"Refund?\" answer:\"Step 1.\nStep 2.\"\n";
        assert_eq!(parse_results(text), vec![pair("Refund?", "Step 1.\nStep 2.")]);
    }

    #[test]
    fn empty_pairs_dropped() {
        let text = r#"Question":"" answer:"orphan" Question":"Kept?" answer:"yes" Question":"Empty?" answer:""#;
        assert_eq!(parse_results(text), vec![pair("Kept?", "yes")]);
    }

    #[test]
    fn leading_text_ignored() {
        let text = r#"以下是结果： Question":"A?" answer:"B""#;
        assert_eq!(parse_results(text), vec![pair("A?", "B")]);
    }

    #[test]
    fn no_markers_no_results() {
        assert!(parse_results("抱歉，没有找到相关内容。").is_empty());
        assert!(parse_results("").is_empty());
    }
}
