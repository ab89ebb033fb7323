//! Label voting over ranked matches, verdict trends and forecasts.
//!
//! # Voting
//!
//! The top `vote_k` matches vote on every label field with weight
//! `max(score, 0)`; when every weight is zero the votes count equally.
//! Confidence is the winning share of the total weight. An exact tie goes to
//! the value that appears first in ranked order, i.e. the one held by the
//! highest-scoring match.
//!
//! # Forecast
//!
//! Each candidate value's vote share over the last `window` verdicts is fit
//! with closed-form least squares `share(t) = baseline + velocity * t` and
//! extrapolated `horizon` steps past the latest verdict.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GlyphError, Result};
use crate::record::LabelField;
use crate::similarity::{Match, MatchSummary};

/// Outcome of the vote on one label field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelVote {
    /// Winning value.
    pub value: String,
    /// Winning share of the total vote weight.
    pub confidence: f32,
    /// Share of every value that received a vote.
    pub distribution: BTreeMap<String, f32>,
}

/// Prediction for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Predicted risk level.
    pub risk_level: String,
    /// Predicted churn driver.
    pub churn_driver: String,
    /// Predicted usage band.
    pub usage_band: String,
    /// Confidence of the risk level vote.
    pub confidence: f32,
    /// Vote detail per field.
    pub votes: BTreeMap<LabelField, LabelVote>,
    /// Matches that took part in the vote, best first.
    pub supporting_matches: Vec<MatchSummary>,
    /// Action of the best match.
    pub recommended_action: String,
    /// Response text of the best match.
    pub response: String,
}

impl Verdict {
    /// Predicted value of one field.
    #[must_use]
    pub fn value(&self, field: LabelField) -> &str {
        match field {
            LabelField::RiskLevel => &self.risk_level,
            LabelField::ChurnDriver => &self.churn_driver,
            LabelField::UsageBand => &self.usage_band,
        }
    }
}

/// Turns ranked matches into verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregator {
    vote_k: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Aggregator {
    /// Create an aggregator that votes over the top `vote_k` matches.
    #[must_use]
    pub const fn new(vote_k: usize) -> Self {
        Self { vote_k }
    }

    /// Vote depth.
    #[must_use]
    pub const fn vote_k(&self) -> usize {
        self.vote_k
    }

    /// Predict labels from matches in ranked order.
    ///
    /// Matches on unannotated patterns do not vote.
    ///
    /// # Errors
    ///
    /// Returns `NoMatches` when no annotated match is supplied.
    pub fn predict(&self, ranked: &[Match<'_>]) -> Result<Verdict> {
        let voters: Vec<_> = ranked
            .iter()
            .filter_map(|m| m.glyph.annotation().map(|a| (m, a)))
            .take(self.vote_k.max(1))
            .collect();
        let Some(&(best, best_annotation)) = voters.first() else {
            return Err(GlyphError::NoMatches);
        };

        let mut weights: Vec<f64> = voters
            .iter()
            .map(|(m, _)| f64::from(m.score.max(0.0)))
            .collect();
        if weights.iter().all(|&w| w == 0.0) {
            weights.fill(1.0);
        }
        let total: f64 = weights.iter().sum();

        let mut votes = BTreeMap::new();
        for field in LabelField::ALL {
            // Values in order of first appearance, which is best-match order.
            let mut tally: Vec<(&str, f64)> = Vec::new();
            for ((_, annotation), &w) in voters.iter().zip(&weights) {
                let value = annotation.labels.get(field);
                match tally.iter_mut().find(|(v, _)| *v == value) {
                    Some((_, acc)) => *acc += w,
                    None => tally.push((value, w)),
                }
            }

            let mut winner = 0;
            for (i, &(_, w)) in tally.iter().enumerate() {
                if w > tally[winner].1 {
                    winner = i;
                }
            }

            votes.insert(
                field,
                LabelVote {
                    value: tally[winner].0.to_string(),
                    confidence: (tally[winner].1 / total) as f32,
                    distribution: tally
                        .iter()
                        .map(|&(v, w)| (v.to_string(), (w / total) as f32))
                        .collect(),
                },
            );
        }

        let pick = |field: LabelField| {
            votes
                .get(&field)
                .map(|v| v.value.clone())
                .unwrap_or_default()
        };
        let verdict = Verdict {
            risk_level: pick(LabelField::RiskLevel),
            churn_driver: pick(LabelField::ChurnDriver),
            usage_band: pick(LabelField::UsageBand),
            confidence: votes
                .get(&LabelField::RiskLevel)
                .map_or(0.0, |v| v.confidence),
            supporting_matches: voters.iter().map(|(m, _)| MatchSummary::from(*m)).collect(),
            recommended_action: best_annotation.recommended_action.clone(),
            response: best_annotation.response.clone(),
            votes,
        };

        debug!(
            risk = %verdict.risk_level,
            confidence = verdict.confidence,
            best = best.index,
            "aggregated verdict"
        );
        Ok(verdict)
    }
}

/// Verdict for one stored snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Snapshot time.
    pub timestamp: DateTime<Utc>,
    /// Verdict for the snapshot.
    pub verdict: Verdict,
}

/// Verdicts over a key's history, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    /// Entity key.
    pub key: String,
    /// One point per snapshot.
    pub points: Vec<TrendPoint>,
}

impl Trend {
    /// Most recent verdict.
    #[must_use]
    pub fn latest(&self) -> Option<&Verdict> {
        self.points.last().map(|p| &p.verdict)
    }
}

/// Projection for one label field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldForecast {
    /// Value with the highest projected share.
    pub value: String,
    /// Projected share of every candidate value, clamped to `[0, 1]`.
    pub projected: BTreeMap<String, f32>,
}

/// Projected verdict for a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Entity key.
    pub key: String,
    /// Projection per field.
    pub fields: BTreeMap<LabelField, FieldForecast>,
    /// Set when fewer than two verdicts were available and the latest one is
    /// echoed.
    pub low_confidence: bool,
    /// Verdicts the projection used.
    pub window: usize,
    /// Steps past the latest verdict.
    pub horizon: usize,
}

impl Forecast {
    /// Projected value of one field.
    #[must_use]
    pub fn value(&self, field: LabelField) -> Option<&str> {
        self.fields.get(&field).map(|f| f.value.as_str())
    }
}

/// Project a trend forward.
///
/// # Errors
///
/// Returns `InsufficientHistory` for an empty trend.
pub fn forecast(trend: &Trend, window: usize, horizon: usize) -> Result<Forecast> {
    let start = trend.points.len().saturating_sub(window.max(1));
    let recent = &trend.points[start..];
    let Some(latest) = recent.last() else {
        return Err(GlyphError::InsufficientHistory {
            key: trend.key.clone(),
            needed: 1,
            found: 0,
        });
    };

    let low_confidence = recent.len() < 2;
    let mut fields = BTreeMap::new();

    for field in LabelField::ALL {
        let Some(latest_vote) = latest.verdict.votes.get(&field) else {
            continue;
        };

        let projected: BTreeMap<String, f32> = if low_confidence {
            latest_vote.distribution.clone()
        } else {
            let mut candidates: Vec<&str> = recent
                .iter()
                .filter_map(|p| p.verdict.votes.get(&field))
                .flat_map(|v| v.distribution.keys().map(String::as_str))
                .collect();
            candidates.sort_unstable();
            candidates.dedup();

            candidates
                .into_iter()
                .map(|value| {
                    let shares: Vec<f64> = recent
                        .iter()
                        .map(|p| {
                            p.verdict
                                .votes
                                .get(&field)
                                .and_then(|v| v.distribution.get(value))
                                .map_or(0.0, |&s| f64::from(s))
                        })
                        .collect();
                    let (baseline, velocity) = linear_fit(&shares);
                    let t = (shares.len() - 1 + horizon) as f64;
                    (value.to_string(), (baseline + velocity * t).clamp(0.0, 1.0) as f32)
                })
                .collect()
        };

        // Highest share wins; ties go to the latest verdict's value.
        let value = projected
            .iter()
            .max_by(|a, b| {
                a.1.total_cmp(b.1)
                    .then((*a.0 == latest_vote.value).cmp(&(*b.0 == latest_vote.value)))
                    .then(b.0.cmp(a.0))
            })
            .map_or_else(|| latest_vote.value.clone(), |(v, _)| v.clone());

        fields.insert(field, FieldForecast { value, projected });
    }

    Ok(Forecast {
        key: trend.key.clone(),
        fields,
        low_confidence,
        window: recent.len(),
        horizon,
    })
}

/// Least-squares line through `(i, y_i)`, returned as `(baseline, velocity)`.
///
/// A single point, or a degenerate system, yields a flat line through the
/// last value.
fn linear_fit(ys: &[f64]) -> (f64, f64) {
    let n = ys.len() as f64;
    let mut sum_t = 0.0f64;
    let mut sum_t2 = 0.0f64;
    let mut sum_y = 0.0f64;
    let mut sum_ty = 0.0f64;
    for (i, &y) in ys.iter().enumerate() {
        let t = i as f64;
        sum_t += t;
        sum_t2 += t * t;
        sum_y += y;
        sum_ty += t * y;
    }

    // [n      sum_t ] [baseline]   [sum_y ]
    // [sum_t  sum_t2] [velocity] = [sum_ty]
    let det = n * sum_t2 - sum_t * sum_t;
    if det.abs() < 1e-10 {
        return (ys.last().copied().unwrap_or(0.0), 0.0);
    }
    let baseline = (sum_t2 * sum_y - sum_t * sum_ty) / det;
    let velocity = (n * sum_ty - sum_t * sum_y) / det;
    (baseline, velocity)
}

#[cfg(test)]
mod tests {
    use glyph_vsa::Hypervector;

    use super::*;
    use crate::encoder::Glyph;
    use crate::library::PatternLibrary;
    use crate::record::{Labels, PatternAnnotation};

    fn pattern(name: &str, risk: &str, driver: &str, action: &str) -> Glyph {
        Glyph::from_vector(Hypervector::zeros(8)).with_annotation(PatternAnnotation {
            name: name.into(),
            labels: Labels::new(risk, driver, "stable"),
            keywords: Vec::new(),
            response: format!("{name} response"),
            recommended_action: action.into(),
        })
    }

    fn ranked<'a>(lib: &'a PatternLibrary, scores: &[f32]) -> Vec<Match<'a>> {
        lib.iter()
            .zip(scores)
            .enumerate()
            .map(|(index, (glyph, &score))| Match { index, glyph, score })
            .collect()
    }

    fn lib() -> PatternLibrary {
        PatternLibrary::from_glyphs(
            8,
            vec![
                pattern("a", "high", "low_usage", "call"),
                pattern("b", "low", "support_burden", "email"),
                pattern("c", "low", "support_burden", "wait"),
                pattern("d", "high", "low_usage", "call"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_weighted_vote() {
        let lib = lib();
        let verdict = Aggregator::new(3).predict(&ranked(&lib, &[0.9, 0.3, 0.2, 0.1])).unwrap();
        assert_eq!(verdict.risk_level, "high");
        assert!((verdict.confidence - 0.9 / 1.4).abs() < 1e-6);
        assert_eq!(verdict.recommended_action, "call");
        assert_eq!(verdict.response, "a response");
        assert_eq!(verdict.supporting_matches.len(), 3);
        let dist = &verdict.votes[&LabelField::RiskLevel].distribution;
        assert!((dist["low"] - 0.5 / 1.4).abs() < 1e-6);
    }

    #[test]
    fn test_majority_beats_single_best() {
        let lib = lib();
        let verdict = Aggregator::new(3).predict(&ranked(&lib, &[0.5, 0.4, 0.4, 0.0])).unwrap();
        assert_eq!(verdict.risk_level, "low");
        assert_eq!(verdict.churn_driver, "support_burden");
        assert_eq!(verdict.recommended_action, "call");
    }

    #[test]
    fn test_tie_goes_to_best_match() {
        let lib = lib();
        let verdict = Aggregator::new(2).predict(&ranked(&lib, &[0.5, 0.5, 0.1, 0.1])).unwrap();
        assert_eq!(verdict.risk_level, "high");
        assert!((verdict.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_negative_scores_vote_uniformly() {
        let lib = lib();
        let verdict = Aggregator::new(3).predict(&ranked(&lib, &[-0.1, -0.2, -0.3, -0.4])).unwrap();
        assert_eq!(verdict.risk_level, "low");
        assert!((verdict.confidence - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_no_matches() {
        assert!(matches!(Aggregator::default().predict(&[]), Err(GlyphError::NoMatches)));
    }

    #[test]
    fn test_linear_fit() {
        let (b, v) = linear_fit(&[0.2, 0.4, 0.6]);
        assert!((b - 0.2).abs() < 1e-9 && (v - 0.2).abs() < 1e-9);
        assert_eq!(linear_fit(&[0.7]), (0.7, 0.0));
    }

    fn point(day: u32, risk: &str, share: f32) -> TrendPoint {
        use chrono::TimeZone;
        let mut distribution = BTreeMap::new();
        distribution.insert(risk.to_string(), share);
        if share < 1.0 {
            let other = if risk == "high" { "low" } else { "high" };
            distribution.insert(other.to_string(), 1.0 - share);
        }
        let vote = LabelVote {
            value: risk.into(),
            confidence: share,
            distribution,
        };
        let mut votes = BTreeMap::new();
        votes.insert(LabelField::RiskLevel, vote);
        TrendPoint {
            timestamp: Utc.with_ymd_and_hms(2024, 5, day, 0, 0, 0).unwrap(),
            verdict: Verdict {
                risk_level: risk.into(),
                churn_driver: String::new(),
                usage_band: String::new(),
                confidence: share,
                votes,
                supporting_matches: Vec::new(),
                recommended_action: String::new(),
                response: String::new(),
            },
        }
    }

    #[test]
    fn test_forecast_follows_trend() {
        // Low risk share falls 0.9 -> 0.7 -> 0.55 while high rises.
        let trend = Trend {
            key: "k".into(),
            points: vec![point(1, "low", 0.9), point(2, "low", 0.7), point(3, "low", 0.55)],
        };
        let f = forecast(&trend, 5, 2).unwrap();
        assert!(!f.low_confidence);
        assert_eq!(f.window, 3);
        assert_eq!(f.value(LabelField::RiskLevel), Some("high"));
        let p = &f.fields[&LabelField::RiskLevel].projected;
        assert!(p.values().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_forecast_single_point_echoes() {
        let trend = Trend {
            key: "k".into(),
            points: vec![point(1, "medium", 1.0)],
        };
        let f = forecast(&trend, 5, 1).unwrap();
        assert!(f.low_confidence);
        assert_eq!(f.value(LabelField::RiskLevel), Some("medium"));

        let empty = Trend { key: "k".into(), points: Vec::new() };
        assert!(matches!(forecast(&empty, 5, 1), Err(GlyphError::InsufficientHistory { .. })));
    }
}
