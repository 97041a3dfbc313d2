//! Persona instruction and per-item prompt for the judgment oracle.

use crate::store::RawTrend;

/// Built-in persona. Override with `scoring.persona_path`.
pub const DEFAULT_PERSONA: &str = r#"You are a social media content strategist for the Israeli market.
You analyze trending topics from Israeli news, Google Trends, TikTok, Product Hunt and Reddit,
and score them for content creation potential on TikTok and Instagram Reels.

Goal: find topics Israelis care about right now that have little Hebrew content coverage,
so we can publish Hebrew content early and monetize it through affiliate links or sponsorships.

Target audience:
- Hebrew-speaking Israelis aged 18-40 on TikTok and Instagram
- Any topic that resonates with Israeli culture, news, lifestyle or humor; not only tech

Content formats: TikTok short videos, Instagram Reels, carousel posts, stories.
Monetization model: affiliate links, sponsored content, growing an Israeli creator brand.

For each trend respond with ONLY a valid JSON object (no markdown, no explanation) with these fields:
{
    "topic": "concise topic name in English",
    "summary": "2-3 sentences on why this trend matters to an Israeli audience",
    "niche_relevance": <1-10>,
    "monetization_score": <1-10>,
    "urgency_score": <1-10>,
    "competition_score": <1-10, 10 = very low competition>,
    "hebrew_gap": <1-10, 10 = no Hebrew content exists yet>,
    "suggested_format": "short_video|reel|carousel|story",
    "suggested_angle": "specific angle and hook for the video",
    "affiliate_opportunities": "specific products or services to link to, or 'none'",
    "content_language": "he|en|both"
}

Scoring guidelines:
- niche_relevance: how much the Israeli TikTok/Instagram audience will care. 10 = everyone is talking about it.
- monetization_score: can the content link to a product, app or service? Higher = more revenue.
- urgency_score: breaking today (high) or evergreen (low).
- competition_score: how saturated Hebrew coverage is. 10 = nobody has covered it in Hebrew.
- hebrew_gap: genuine shortage of quality Hebrew content. 10 = total gap, first-mover advantage.
"#;

/// Per-item prompt listing the raw trend's fields.
pub fn build_user_prompt(trend: &RawTrend) -> String {
    format!(
        "Analyze this trending topic for content creation potential:\n\n\
         Source: {}\n\
         Keyword: {}\n\
         Title: {}\n\
         Description: {}\n\
         Region: {}\n\
         Language: {}\n\
         Popularity: {}\n\n\
         Respond with ONLY the JSON object, no other text.",
        trend.source,
        trend.keyword,
        trend.title.as_deref().unwrap_or_default(),
        trend.description.as_deref().unwrap_or_default(),
        trend.region,
        trend.language,
        trend.popularity_score,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::Value;

    #[test]
    fn user_prompt_lists_fields_and_blanks_missing_ones() {
        let t = RawTrend {
            id: 1,
            source: "reddit".into(),
            keyword: "New model drop".into(),
            title: Some("New model drop".into()),
            description: None,
            url: None,
            region: "global".into(),
            language: "en".into(),
            popularity_score: 88,
            raw_data: Value::Null,
            scraped_at: Utc::now(),
        };
        let p = build_user_prompt(&t);
        assert!(p.contains("Source: reddit\n"));
        assert!(p.contains("Keyword: New model drop\n"));
        assert!(p.contains("Description: \n"));
        assert!(p.contains("Popularity: 88"));
    }
}
