//! Tolerant extraction of a JSON value from free-form oracle text.
//!
//! LLMs wrap JSON in markdown fences more often than not. Each strategy
//! proposes one candidate slice; the first candidate that parses wins.

use serde_json::Value;

use crate::error::JudgmentError;

const FENCE: &str = "```";
const JSON_TAG: &str = "```json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Content of the first block fenced as ```json.
    TaggedFence,
    /// Content of the first fenced block of any tag, info string dropped.
    AnyFence,
    /// The whole (trimmed) text.
    Plain,
}

pub const DEFAULT_STRATEGIES: [ExtractionStrategy; 3] = [
    ExtractionStrategy::TaggedFence,
    ExtractionStrategy::AnyFence,
    ExtractionStrategy::Plain,
];

impl ExtractionStrategy {
    /// Candidate slice for this strategy, or `None` when it does not apply.
    pub fn candidate<'a>(&self, text: &'a str) -> Option<&'a str> {
        match self {
            Self::TaggedFence => tagged_fence(text),
            Self::AnyFence => any_fence(text),
            Self::Plain => Some(text.trim()),
        }
    }
}

/// Try `strategies` in order and return the first candidate that parses.
pub fn extract_structured(
    text: &str,
    strategies: &[ExtractionStrategy],
) -> Result<Value, JudgmentError> {
    let text = text.trim();
    for strategy in strategies {
        let Some(candidate) = strategy.candidate(text) else {
            continue;
        };
        match serde_json::from_str::<Value>(candidate) {
            Ok(v) => return Ok(v),
            Err(e) => {
                tracing::debug!(target: "scoring", ?strategy, error = %e, "candidate did not parse");
            }
        }
    }
    Err(JudgmentError::NoStructuredData)
}

fn until_fence(s: &str) -> &str {
    match s.find(FENCE) {
        Some(i) => &s[..i],
        None => s,
    }
}

fn tagged_fence(text: &str) -> Option<&str> {
    // ASCII lowercasing keeps byte offsets intact.
    let start = text.to_ascii_lowercase().find(JSON_TAG)? + JSON_TAG.len();
    Some(until_fence(&text[start..]).trim())
}

fn any_fence(text: &str) -> Option<&str> {
    let start = text.find(FENCE)? + FENCE.len();
    let body = until_fence(&text[start..]);
    let body = match body.split_once('\n') {
        Some((first, rest)) if is_info_string(first) => rest,
        _ => body,
    };
    Some(body.trim())
}

fn is_info_string(line: &str) -> bool {
    let l = line.trim();
    !l.is_empty() && !l.contains(['{', '[', '"']) && !l.contains(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OBJ: &str = r#"{"topic":"x","n":1}"#;

    #[test]
    fn tagged_fence_is_case_insensitive() {
        let text = format!("Sure!\n```JSON\n{OBJ}\n```\nbye");
        assert_eq!(tagged_fence(&text), Some(OBJ));
    }

    #[test]
    fn unclosed_fence_takes_the_rest() {
        let text = format!("```json\n{OBJ}");
        assert_eq!(tagged_fence(&text), Some(OBJ));
    }

    #[test]
    fn any_fence_drops_info_string() {
        let text = format!("```javascript\n{OBJ}\n```");
        assert_eq!(any_fence(&text), Some(OBJ));
        let inline = format!("```{OBJ}```");
        assert_eq!(any_fence(&inline), Some(OBJ));
    }

    #[test]
    fn falls_through_to_plain_when_fence_is_garbage() {
        // The fenced block is prose, but the full text is not JSON either.
        let text = "```\nnot json\n```";
        assert_eq!(
            extract_structured(text, &DEFAULT_STRATEGIES),
            Err(JudgmentError::NoStructuredData)
        );
    }

    #[test]
    fn first_tagged_block_wins_over_later_blocks() {
        let text = "```json\n{\"a\":1}\n```\n```json\n{\"a\":2}\n```";
        let v = extract_structured(text, &DEFAULT_STRATEGIES).unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn strategies_are_configurable() {
        let text = format!("```json\n{OBJ}\n```");
        assert!(extract_structured(&text, &[ExtractionStrategy::Plain]).is_err());
        assert!(extract_structured(&text, &[ExtractionStrategy::TaggedFence]).is_ok());
    }
}
