//! Aggregation of the five sub-scores.
//!
//! - `overall_score` is persisted with every scored trend.
//! - `rank_top` orders an in-memory batch for the end-of-cycle report only.
//!
//! Rounding of the overall score is half-to-even after snapping the weighted
//! sum to a 1e-9 grid, so 1.5 and 2.5 both become 2 and float noise such as
//! 1.4999999999999998 still counts as the tie 1.5.

use super::judgment::{Judgment, SubScores};
use super::weights::ScoreWeights;

const SNAP: f64 = 1e9;

/// Number of entries in the end-of-cycle report.
pub const DEFAULT_TOP_N: usize = 5;

/// Persisted overall score: weighted sum, rounded half-to-even.
pub fn overall_score(scores: &SubScores, weights: &ScoreWeights) -> i64 {
    let raw = weights.apply(scores);
    let snapped = (raw * SNAP).round() / SNAP;
    snapped.round_ties_even() as i64
}

/// Report sort key. Never persisted.
pub fn report_key(scores: &SubScores, weights: &ScoreWeights) -> f64 {
    weights.apply(scores)
}

/// Top `n` of `batch` by the report key, descending. Ties keep batch order.
pub fn rank_top<'a>(batch: &'a [Judgment], weights: &ScoreWeights, n: usize) -> Vec<&'a Judgment> {
    let mut keyed: Vec<(f64, &Judgment)> = batch
        .iter()
        .map(|j| (report_key(&j.scores, weights), j))
        .collect();
    // `sort_by` is stable; comparing b to a gives descending order.
    keyed.sort_by(|a, b| b.0.total_cmp(&a.0));
    keyed.into_iter().take(n).map(|(_, j)| j).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::judgment::ContentFormat;

    fn s(r: i64, m: i64, u: i64, c: i64, g: i64) -> SubScores {
        SubScores {
            relevance: r,
            monetization: m,
            urgency: u,
            competition: c,
            content_gap: g,
        }
    }

    fn judged(id: i64, scores: SubScores) -> Judgment {
        Judgment {
            raw_trend_id: id,
            topic: format!("topic {id}"),
            summary: String::new(),
            scores,
            suggested_format: ContentFormat::ShortVideo,
            suggested_angle: String::new(),
            affiliate_opportunities: String::new(),
            content_language: "he".into(),
        }
    }

    #[test]
    fn bounds_map_to_bounds() {
        let w = ScoreWeights::REFERENCE;
        assert_eq!(overall_score(&s(10, 10, 10, 10, 10), &w), 10);
        assert_eq!(overall_score(&s(1, 1, 1, 1, 1), &w), 1);
    }

    #[test]
    fn reference_examples_round_to_nearest() {
        // 8*.15 + 9*.30 + 3*.15 + 6*.15 + 10*.25 = 7.75
        assert_eq!(overall_score(&s(8, 9, 3, 6, 10), &ScoreWeights::REFERENCE), 8);
        // 5*.15 + 9*.30 + 5*.15 + 5*.15 + 10*.25 = 7.45
        assert_eq!(overall_score(&s(5, 9, 5, 5, 10), &ScoreWeights::REFERENCE), 7);
    }

    #[test]
    fn ties_round_half_to_even() {
        let w = ScoreWeights::REFERENCE;
        // 0.15*3 + 0.30 + 0.25*3 = 1.5 -> 2
        assert_eq!(overall_score(&s(1, 1, 1, 1, 3), &w), 2);
        // 0.15*3 + 0.30 + 0.25*7 = 2.5 -> 2
        assert_eq!(overall_score(&s(1, 1, 1, 1, 7), &w), 2);
    }

    #[test]
    fn overall_and_report_weights_are_independent() {
        let scores = s(10, 1, 1, 1, 1);
        let report = ScoreWeights {
            relevance: 1.0,
            monetization: 0.0,
            urgency: 0.0,
            competition: 0.0,
            content_gap: 0.0,
        };
        assert_eq!(overall_score(&scores, &ScoreWeights::REFERENCE), 2);
        assert!((report_key(&scores, &report) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn rank_top_is_descending_stable_and_truncated() {
        let batch = vec![
            judged(1, s(5, 5, 5, 5, 5)),
            judged(2, s(9, 9, 9, 9, 9)),
            judged(3, s(5, 5, 5, 5, 5)),
            judged(4, s(1, 1, 1, 1, 1)),
            judged(5, s(7, 7, 7, 7, 7)),
            judged(6, s(5, 5, 5, 5, 5)),
            judged(7, s(2, 2, 2, 2, 2)),
        ];
        let top = rank_top(&batch, &ScoreWeights::REFERENCE, DEFAULT_TOP_N);
        let ids: Vec<i64> = top.iter().map(|j| j.raw_trend_id).collect();
        assert_eq!(ids, vec![2, 5, 1, 3, 6]);
    }

    #[test]
    fn rank_top_handles_short_batches() {
        let batch = vec![judged(1, s(3, 3, 3, 3, 3))];
        assert_eq!(rank_top(&batch, &ScoreWeights::REFERENCE, 5).len(), 1);
        assert!(rank_top(&[], &ScoreWeights::REFERENCE, 5).is_empty());
    }
}
