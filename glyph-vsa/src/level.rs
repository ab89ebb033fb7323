//! Level (thermometer) hypervectors for ordinal values.
//!
//! Level `i` is the base vector with the first `i * flips_per_step` positions
//! of a fixed permutation negated. The flip sets of successive steps are
//! disjoint, so for a dense base
//!
//! ```text
//! cos(level_i, level_j) = 1 - 2 * |i - j| * flips_per_step / D
//! ```
//!
//! which decreases strictly with `|i - j|`.

use crate::error::{Result, VsaError};
use crate::hypervector::Hypervector;

/// A chain of correlated hypervectors, one per ordinal level.
///
/// # Examples
///
/// ```
/// use glyph_vsa::level::LevelChain;
/// use glyph_vsa::random::{derive_seed, permutation, random_bipolar};
/// use glyph_vsa::vsa::cosine_similarity;
///
/// let dim = 2048;
/// let base = random_bipolar(dim, derive_seed(1, "age", "@level-base"));
/// let order = permutation(dim, derive_seed(1, "age", "@level-perm"));
/// let chain = LevelChain::new(base, order, 11, LevelChain::default_flips(dim, 11)).unwrap();
///
/// let l0 = chain.level(0).unwrap();
/// let l1 = chain.level(1).unwrap();
/// let l10 = chain.level(10).unwrap();
/// assert!(cosine_similarity(&l0, &l1).unwrap() > cosine_similarity(&l0, &l10).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct LevelChain {
    base: Hypervector,
    order: Vec<usize>,
    levels: usize,
    flips_per_step: usize,
}

impl LevelChain {
    /// Build a chain.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `order` does not cover the base vector,
    /// and `LevelOverflow` if the last level would flip more than `D`
    /// positions.
    pub fn new(
        base: Hypervector,
        order: Vec<usize>,
        levels: usize,
        flips_per_step: usize,
    ) -> Result<Self> {
        if order.len() != base.len() {
            return Err(VsaError::DimensionMismatch {
                expected: base.len(),
                actual: order.len(),
            });
        }
        let required = levels.saturating_sub(1).saturating_mul(flips_per_step);
        if required > base.len() {
            return Err(VsaError::LevelOverflow {
                required,
                dimension: base.len(),
            });
        }
        Ok(Self {
            base,
            order,
            levels,
            flips_per_step,
        })
    }

    /// Flips per step that make the first and last level orthogonal.
    #[must_use]
    pub fn default_flips(dim: usize, levels: usize) -> usize {
        if levels < 2 {
            return 0;
        }
        (dim / (2 * (levels - 1))).max(1)
    }

    /// Number of levels.
    #[must_use]
    pub const fn levels(&self) -> usize {
        self.levels
    }

    /// Positions negated per step.
    #[must_use]
    pub const fn flips_per_step(&self) -> usize {
        self.flips_per_step
    }

    /// Hypervector for one level.
    ///
    /// # Errors
    ///
    /// Returns `LevelOutOfRange` if `level >= levels()`.
    pub fn level(&self, level: usize) -> Result<Hypervector> {
        if level >= self.levels {
            return Err(VsaError::LevelOutOfRange {
                level,
                levels: self.levels,
            });
        }
        let mut v = self.base.clone();
        for &pos in &self.order[..level * self.flips_per_step] {
            v.negate_at(pos);
        }
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{derive_seed, permutation, random_bipolar};
    use crate::vsa::cosine_similarity;

    fn chain(dim: usize, levels: usize) -> LevelChain {
        let base = random_bipolar(dim, derive_seed(5, "m", "@level-base"));
        let order = permutation(dim, derive_seed(5, "m", "@level-perm"));
        LevelChain::new(base, order, levels, LevelChain::default_flips(dim, levels)).unwrap()
    }

    #[test]
    fn test_similarity_decreases_with_distance() {
        let c = chain(4000, 21);
        let l0 = c.level(0).unwrap();
        let mut previous = f32::INFINITY;
        for i in 0..21 {
            let sim = cosine_similarity(&l0, &c.level(i).unwrap()).unwrap();
            assert!(sim < previous, "level {i}: {sim} !< {previous}");
            previous = sim;
        }
    }

    #[test]
    fn test_extremes_orthogonal() {
        let c = chain(4000, 21);
        let sim = cosine_similarity(&c.level(0).unwrap(), &c.level(20).unwrap()).unwrap();
        assert!(sim.abs() < 0.01, "extreme levels should be orthogonal, got {sim}");
    }

    #[test]
    fn test_exact_similarity_formula() {
        let c = chain(1000, 6);
        let flips = c.flips_per_step();
        let sim = cosine_similarity(&c.level(1).unwrap(), &c.level(4).unwrap()).unwrap();
        let expected = 1.0 - 2.0 * 3.0 * flips as f32 / 1000.0;
        assert!((sim - expected).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_range_and_overflow() {
        let c = chain(100, 3);
        assert!(matches!(
            c.level(3),
            Err(VsaError::LevelOutOfRange { level: 3, levels: 3 })
        ));

        let base = random_bipolar(100, derive_seed(0, "x", "y"));
        let order = permutation(100, derive_seed(0, "x", "z"));
        assert!(matches!(
            LevelChain::new(base, order, 11, 20),
            Err(VsaError::LevelOverflow { required: 200, dimension: 100 })
        ));
    }
}
