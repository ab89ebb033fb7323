//! Scoring and ranking against the pattern library.
//!
//! Scores are computed in parallel and merged by a total order on
//! `(score desc, insertion index asc)`, so a ranking is reproducible
//! bit-for-bit regardless of thread count.

use glyph_vsa::vsa::cosine_similarity;
use glyph_vsa::Hypervector;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{LayerConfig, ScoreMode};
use crate::encoder::Glyph;
use crate::error::{GlyphError, Result};
use crate::library::PatternLibrary;

/// A ranked library entry.
#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    /// Position in the library.
    pub index: usize,
    /// The matched pattern.
    pub glyph: &'a Glyph,
    /// Similarity in `[-1, 1]`.
    pub score: f32,
}

/// How to score a query glyph against a pattern.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    mode: ScoreMode,
    layers: Vec<LayerConfig>,
}

impl Scorer {
    /// Create a scorer.
    #[must_use]
    pub fn new(mode: ScoreMode, layers: Vec<LayerConfig>) -> Self {
        Self { mode, layers }
    }

    /// Scoring mode.
    #[must_use]
    pub const fn mode(&self) -> ScoreMode {
        self.mode
    }

    /// Score a query against one pattern.
    ///
    /// Layered mode averages per-layer cosines over the layers both glyphs
    /// carry, weighted by layer weight, and falls back to the global cosine
    /// when they share none.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the glyphs differ in dimension.
    pub fn score(&self, query: &Glyph, pattern: &Glyph) -> Result<f32> {
        check_dimension(pattern.dimension(), query.vector())?;
        if self.mode == ScoreMode::Layered {
            let mut total = 0.0f64;
            let mut weight = 0.0f64;
            for layer in &self.layers {
                if let (Some(q), Some(p)) = (query.layer(&layer.name), pattern.layer(&layer.name)) {
                    let w = f64::from(layer.weight);
                    total += w * f64::from(cosine_similarity(q, p)?);
                    weight += w;
                }
            }
            if weight > 0.0 {
                return Ok((total / weight) as f32);
            }
        }
        Ok(cosine_similarity(query.vector(), pattern.vector())?)
    }

    /// Rank a query glyph against the library.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTopK` for `top_k == 0` and `DimensionMismatch` if the
    /// query does not share the library dimension.
    pub fn rank<'a>(
        &self,
        query: &Glyph,
        library: &'a PatternLibrary,
        top_k: usize,
    ) -> Result<Vec<Match<'a>>> {
        check_top_k(top_k)?;
        check_dimension(library.dimension(), query.vector())?;
        rank_by(library, top_k, |pattern| self.score(query, pattern))
    }
}

/// Rank a raw vector against the library by global cosine.
///
/// # Errors
///
/// Returns `InvalidTopK` for `top_k == 0` and `DimensionMismatch` if the
/// query does not share the library dimension.
///
/// # Example
///
/// ```rust
/// use glyph_churn::{rank, GlyphError, PatternLibrary};
/// use glyph_vsa::Hypervector;
///
/// let library = PatternLibrary::from_glyphs(64, Vec::new()).unwrap();
/// let query = Hypervector::zeros(64);
/// assert!(rank(&query, &library, 3).unwrap().is_empty());
/// assert!(matches!(rank(&query, &library, 0), Err(GlyphError::InvalidTopK(0))));
/// ```
pub fn rank<'a>(
    query: &Hypervector,
    library: &'a PatternLibrary,
    top_k: usize,
) -> Result<Vec<Match<'a>>> {
    check_top_k(top_k)?;
    check_dimension(library.dimension(), query)?;
    rank_by(library, top_k, |pattern| {
        Ok(cosine_similarity(query, pattern.vector())?)
    })
}

fn rank_by<'a, F>(library: &'a PatternLibrary, top_k: usize, score: F) -> Result<Vec<Match<'a>>>
where
    F: Fn(&Glyph) -> Result<f32> + Sync,
{
    let mut scored: Vec<(usize, f32)> = library
        .all()
        .par_iter()
        .enumerate()
        .map(|(i, g)| score(g).map(|s| (i, s)))
        .collect::<Result<_>>()?;

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(top_k);

    debug!(
        candidates = library.len(),
        returned = scored.len(),
        best = scored.first().map(|s| s.1),
        "ranked query"
    );

    Ok(scored
        .into_iter()
        .filter_map(|(index, score)| {
            library.get(index).map(|glyph| Match {
                index,
                glyph,
                score,
            })
        })
        .collect())
}

fn check_top_k(top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(GlyphError::InvalidTopK(top_k));
    }
    Ok(())
}

fn check_dimension(expected: usize, query: &Hypervector) -> Result<()> {
    if query.len() != expected {
        return Err(GlyphError::DimensionMismatch {
            expected,
            actual: query.len(),
        });
    }
    Ok(())
}

/// Owned summary of a ranked match, as surfaced in verdicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    /// Position in the library.
    pub index: usize,
    /// Pattern name.
    pub name: String,
    /// Similarity in `[-1, 1]`.
    pub score: f32,
    /// Pattern labels, if the pattern was annotated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<crate::record::Labels>,
}

impl From<&Match<'_>> for MatchSummary {
    fn from(m: &Match<'_>) -> Self {
        let annotation = m.glyph.annotation();
        Self {
            index: m.index,
            name: annotation.map(|a| a.name.clone()).unwrap_or_default(),
            score: m.score,
            labels: annotation.map(|a| a.labels.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glyph_vsa::random::{derive_seed, random_bipolar};

    use super::*;
    use crate::config::ModelConfig;
    use crate::encoder::Encoder;
    use crate::record::{Labels, PatternAnnotation, Record, TrainingEntry};
    use crate::symbols::SymbolSpace;

    fn library(dim: usize, logins: &[f64]) -> (Encoder, PatternLibrary) {
        let encoder = Encoder::new(Arc::new(
            SymbolSpace::new(&ModelConfig::churn().with_dimension(dim)).unwrap(),
        ));
        let entries: Vec<_> = logins
            .iter()
            .enumerate()
            .map(|(i, &l)| {
                TrainingEntry::new(
                    Record::new().with_numeric("logins", l),
                    PatternAnnotation {
                        name: format!("p{i}"),
                        labels: Labels::default(),
                        ..PatternAnnotation::default()
                    },
                )
            })
            .collect();
        let lib = PatternLibrary::build(&encoder, &entries).unwrap();
        (encoder, lib)
    }

    fn query(encoder: &Encoder, logins: f64) -> Glyph {
        let record = Record::new()
            .with_numeric("logins", logins)
            .with_numeric("support_cases", 2.0)
            .with_numeric("defects", 1.0)
            .with_numeric("feature_adoption", 50.0);
        encoder.encode(&record).unwrap()
    }

    #[test]
    fn test_rank_orders_by_score() {
        let (encoder, lib) = library(4096, &[150.0, 0.0, 60.0]);
        let q = query(&encoder, 0.0);
        let matches = rank(q.vector(), &lib, 3).unwrap();
        assert_eq!(matches.iter().map(|m| m.index).collect::<Vec<_>>(), vec![1, 2, 0]);
        assert!((matches[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rank_with_distinct_scores_ignores_library_order() {
        let ranked = |logins: &[f64]| {
            let (encoder, lib) = library(4096, logins);
            let q = query(&encoder, 10.0);
            rank(q.vector(), &lib, logins.len())
                .unwrap()
                .iter()
                .map(|m| (logins[m.index].to_bits(), m.score.to_bits()))
                .collect::<Vec<_>>()
        };
        let forward = ranked(&[0.0, 40.0, 90.0, 150.0]);
        let shuffled = ranked(&[150.0, 0.0, 90.0, 40.0]);
        assert_eq!(forward, shuffled);
        assert_eq!(forward[0].0, 0.0f64.to_bits());
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let (encoder, lib) = library(2048, &[30.0, 100.0, 30.0, 30.0]);
        let q = query(&encoder, 30.0);
        let matches = rank(q.vector(), &lib, 3).unwrap();
        assert_eq!(matches.iter().map(|m| m.index).collect::<Vec<_>>(), vec![0, 2, 3]);
    }

    #[test]
    fn test_top_k_bounds() {
        let (encoder, lib) = library(1024, &[0.0, 10.0]);
        let q = query(&encoder, 0.0);
        assert!(matches!(rank(q.vector(), &lib, 0), Err(GlyphError::InvalidTopK(0))));
        assert_eq!(rank(q.vector(), &lib, 10).unwrap().len(), 2);
        assert!(matches!(
            rank(&Hypervector::zeros(8), &lib, 1),
            Err(GlyphError::DimensionMismatch { expected: 1024, actual: 8 })
        ));
    }

    #[test]
    fn test_zero_query_scores_zero() {
        let (_, lib) = library(512, &[0.0]);
        let matches = rank(&Hypervector::zeros(512), &lib, 1).unwrap();
        assert!(matches[0].score.abs() < f32::EPSILON);
    }

    #[test]
    fn test_rank_is_reproducible() {
        let (_, lib) = library(2048, &[0.0, 20.0, 40.0, 80.0, 160.0]);
        let q = random_bipolar(2048, derive_seed(1, "q", "q"));
        let a: Vec<_> = rank(&q, &lib, 5).unwrap().iter().map(|m| (m.index, m.score.to_bits())).collect();
        let b: Vec<_> = rank(&q, &lib, 5).unwrap().iter().map(|m| (m.index, m.score.to_bits())).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_layered_scoring_falls_back_to_global() {
        let (encoder, lib) = library(2048, &[0.0]);
        let config = ModelConfig::churn();
        let q = query(&encoder, 0.0);
        let layered = Scorer::new(ScoreMode::Layered, config.layers.clone());
        // Only the metrics layer is shared, so layered equals its cosine.
        let s = layered.score(&q, lib.get(0).unwrap()).unwrap();
        assert!((s - 1.0).abs() < 1e-6);

        let bare = Glyph::from_vector(q.vector().clone());
        let global = Scorer::default().score(&bare, lib.get(0).unwrap()).unwrap();
        assert!((layered.score(&bare, lib.get(0).unwrap()).unwrap() - global).abs() < f32::EPSILON);
    }

    #[test]
    fn test_match_summary() {
        let (encoder, lib) = library(512, &[0.0]);
        let q = query(&encoder, 0.0);
        let ranked = Scorer::default().rank(&q, &lib, 1).unwrap();
        let summary = MatchSummary::from(&ranked[0]);
        assert_eq!(summary.name, "p0");
        assert_eq!(summary.labels, Some(Labels::default()));
    }
}
