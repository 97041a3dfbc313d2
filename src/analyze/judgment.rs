//! Validation of a parsed oracle response into an accepted [`Judgment`].
//!
//! Wire names of the five sub-scores are shared with the scored_trends table
//! and any downstream reader; do not rename them without a migration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::extract::{extract_structured, ExtractionStrategy};
use crate::error::JudgmentError;

pub const SCORE_MIN: i64 = 1;
pub const SCORE_MAX: i64 = 10;

pub const FIELD_TOPIC: &str = "topic";
pub const FIELD_SUMMARY: &str = "summary";
pub const FIELD_RELEVANCE: &str = "niche_relevance";
pub const FIELD_MONETIZATION: &str = "monetization_score";
pub const FIELD_URGENCY: &str = "urgency_score";
pub const FIELD_COMPETITION: &str = "competition_score";
pub const FIELD_CONTENT_GAP: &str = "hebrew_gap";

pub const SCORE_FIELDS: [&str; 5] = [
    FIELD_RELEVANCE,
    FIELD_MONETIZATION,
    FIELD_URGENCY,
    FIELD_COMPETITION,
    FIELD_CONTENT_GAP,
];

/// Default required-field set: topic, summary and the five sub-scores.
pub fn default_required_fields() -> Vec<String> {
    [FIELD_TOPIC, FIELD_SUMMARY]
        .into_iter()
        .chain(SCORE_FIELDS)
        .map(str::to_string)
        .collect()
}

/// The five bounded opportunity dimensions, each in [1,10].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubScores {
    #[serde(rename = "niche_relevance")]
    pub relevance: i64,
    #[serde(rename = "monetization_score")]
    pub monetization: i64,
    #[serde(rename = "urgency_score")]
    pub urgency: i64,
    #[serde(rename = "competition_score")]
    pub competition: i64,
    #[serde(rename = "hebrew_gap")]
    pub content_gap: i64,
}

impl SubScores {
    /// Build from raw values, clamping each into [1,10].
    pub fn clamped(
        relevance: i64,
        monetization: i64,
        urgency: i64,
        competition: i64,
        content_gap: i64,
    ) -> Self {
        Self {
            relevance: clamp_score(relevance),
            monetization: clamp_score(monetization),
            urgency: clamp_score(urgency),
            competition: clamp_score(competition),
            content_gap: clamp_score(content_gap),
        }
    }
}

pub fn clamp_score(v: i64) -> i64 {
    v.clamp(SCORE_MIN, SCORE_MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    #[default]
    ShortVideo,
    Reel,
    Carousel,
    Story,
}

impl ContentFormat {
    /// Unknown or missing formats fall back to `short_video`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "reel" | "reels" => Self::Reel,
            "carousel" => Self::Carousel,
            "story" | "stories" => Self::Story,
            _ => Self::ShortVideo,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShortVideo => "short_video",
            Self::Reel => "reel",
            Self::Carousel => "carousel",
            Self::Story => "story",
        }
    }
}

/// An accepted, validated, clamped oracle judgment for one raw trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub raw_trend_id: i64,
    pub topic: String,
    pub summary: String,
    pub scores: SubScores,
    pub suggested_format: ContentFormat,
    pub suggested_angle: String,
    pub affiliate_opportunities: String,
    pub content_language: String,
}

/// Extract, validate and clamp one oracle response.
pub fn parse_judgment(
    raw_trend_id: i64,
    text: &str,
    required_fields: &[String],
    strategies: &[ExtractionStrategy],
) -> Result<Judgment, JudgmentError> {
    let value = extract_structured(text, strategies)?;
    let Value::Object(obj) = value else {
        return Err(JudgmentError::NotAnObject);
    };

    if let Some(missing) = required_fields.iter().find(|f| !obj.contains_key(f.as_str())) {
        return Err(JudgmentError::MissingField(missing.clone()));
    }

    let scores = SubScores {
        relevance: score_field(&obj, FIELD_RELEVANCE)?,
        monetization: score_field(&obj, FIELD_MONETIZATION)?,
        urgency: score_field(&obj, FIELD_URGENCY)?,
        competition: score_field(&obj, FIELD_COMPETITION)?,
        content_gap: score_field(&obj, FIELD_CONTENT_GAP)?,
    };

    let content_language = text_field(&obj, "content_language");
    Ok(Judgment {
        raw_trend_id,
        topic: text_field(&obj, FIELD_TOPIC),
        summary: text_field(&obj, FIELD_SUMMARY),
        scores,
        suggested_format: ContentFormat::parse_lenient(&text_field(&obj, "suggested_format")),
        suggested_angle: text_field(&obj, "suggested_angle"),
        affiliate_opportunities: text_field(&obj, "affiliate_opportunities"),
        content_language: if content_language.trim().is_empty() {
            crate::ingest::types::DEFAULT_LANGUAGE.to_string()
        } else {
            content_language
        },
    })
}

fn score_field(obj: &Map<String, Value>, field: &str) -> Result<i64, JudgmentError> {
    let v = obj
        .get(field)
        .ok_or_else(|| JudgmentError::MissingField(field.to_string()))?;
    coerce_score(v)
        .map(clamp_score)
        .ok_or_else(|| JudgmentError::NonNumericScore {
            field: field.to_string(),
            value: v.to_string(),
        })
}

/// Integers as-is, floats truncated toward zero, numeric strings parsed.
fn coerce_score(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn text_field(obj: &Map<String, Value>, field: &str) -> String {
    match obj.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::extract::DEFAULT_STRATEGIES;

    fn parse(text: &str) -> Result<Judgment, JudgmentError> {
        parse_judgment(7, text, &default_required_fields(), &DEFAULT_STRATEGIES)
    }

    fn body(scores: [&str; 5]) -> String {
        format!(
            r#"{{"topic":"t","summary":"s","niche_relevance":{},"monetization_score":{},"urgency_score":{},"competition_score":{},"hebrew_gap":{}}}"#,
            scores[0], scores[1], scores[2], scores[3], scores[4]
        )
    }

    #[test]
    fn clamps_out_of_range_scores() {
        let j = parse(&body(["0", "1", "10", "11", "7"])).unwrap();
        assert_eq!(j.scores, SubScores {
            relevance: 1,
            monetization: 1,
            urgency: 10,
            competition: 10,
            content_gap: 7,
        });
        assert_eq!(j.raw_trend_id, 7);
    }

    #[test]
    fn floats_truncate_and_numeric_strings_parse() {
        let j = parse(&body(["7.9", "\"8\"", "-3.5", "1e3", "\" 4 \""])).unwrap();
        assert_eq!(j.scores.relevance, 7);
        assert_eq!(j.scores.monetization, 8);
        assert_eq!(j.scores.urgency, 1);
        assert_eq!(j.scores.competition, 10);
        assert_eq!(j.scores.content_gap, 4);
    }

    #[test]
    fn non_numeric_score_is_rejected() {
        let err = parse(&body(["\"high\"", "1", "1", "1", "1"])).unwrap_err();
        assert!(matches!(
            err,
            JudgmentError::NonNumericScore { ref field, .. } if field == FIELD_RELEVANCE
        ));
        assert!(parse(&body(["null", "1", "1", "1", "1"])).is_err());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let text = r#"{"topic":"t","niche_relevance":1,"monetization_score":1,"urgency_score":1,"competition_score":1,"hebrew_gap":1}"#;
        assert_eq!(
            parse(text).unwrap_err(),
            JudgmentError::MissingField(FIELD_SUMMARY.into())
        );
    }

    #[test]
    fn non_object_is_rejected() {
        assert_eq!(parse("[1,2,3]").unwrap_err(), JudgmentError::NotAnObject);
    }

    #[test]
    fn optional_fields_get_defaults() {
        let j = parse(&body(["5", "5", "5", "5", "5"])).unwrap();
        assert_eq!(j.suggested_format, ContentFormat::ShortVideo);
        assert_eq!(j.content_language, "he");
        assert_eq!(j.suggested_angle, "");
    }

    #[test]
    fn format_parsing_is_lenient() {
        assert_eq!(ContentFormat::parse_lenient("Reel"), ContentFormat::Reel);
        assert_eq!(ContentFormat::parse_lenient("carousel"), ContentFormat::Carousel);
        assert_eq!(ContentFormat::parse_lenient("short-video"), ContentFormat::ShortVideo);
        assert_eq!(ContentFormat::parse_lenient("podcast"), ContentFormat::ShortVideo);
    }

    #[test]
    fn fenced_and_bare_forms_parse_identically() {
        let obj = r#"{"topic":"AI agents","summary":"s","niche_relevance":8,"monetization_score":9,"urgency_score":3,"competition_score":6,"hebrew_gap":10,"suggested_format":"reel"}"#;
        let tagged = parse(&format!("Here you go:\n```json\n{obj}\n```\nThanks")).unwrap();
        let untagged = parse(&format!("```\n{obj}\n```")).unwrap();
        let bare = parse(&format!("  {obj}\n")).unwrap();

        assert_eq!(tagged, untagged);
        assert_eq!(tagged, bare);
        assert_eq!(tagged.topic, "AI agents");
        assert_eq!(tagged.suggested_format, ContentFormat::Reel);
    }
}
