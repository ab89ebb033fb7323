//! Bundle operation (superposition via weighted voting).
//!
//! Each input votes its sign in every component, scaled by an integer
//! weight. The bundle takes the sign of the total; an exact tie yields zero.
//! Integer weights keep the result independent of summation order.

use crate::error::{Result, VsaError};
use crate::hypervector::Hypervector;
use crate::trit::Trit;

/// Majority trit of a slice. Ties resolve to zero.
///
/// # Examples
///
/// ```
/// use glyph_vsa::{Trit, vsa::majority_trit};
///
/// assert_eq!(majority_trit(&[Trit::P, Trit::P, Trit::N]), Trit::P);
/// assert_eq!(majority_trit(&[Trit::P, Trit::N]), Trit::Z);
/// ```
#[must_use]
pub fn majority_trit(trits: &[Trit]) -> Trit {
    Trit::from_sign(trits.iter().map(|t| i64::from(t.value())).sum())
}

/// Incremental weighted bundler.
///
/// # Examples
///
/// ```
/// use glyph_vsa::{Hypervector, Trit, vsa::Bundler};
///
/// let a = Hypervector::from_i8_slice(&[1, 1, -1]).unwrap();
/// let b = Hypervector::from_i8_slice(&[1, -1, -1]).unwrap();
///
/// let mut bundler = Bundler::new(3);
/// bundler.add_weighted(&a, 900).unwrap();
/// bundler.add_weighted(&b, 1000).unwrap();
///
/// let out = bundler.finish();
/// assert_eq!(out.to_i8_vec(), vec![1, -1, -1]);
/// ```
#[derive(Debug, Clone)]
pub struct Bundler {
    sums: Vec<i64>,
    count: usize,
}

impl Bundler {
    /// Create an empty bundler for `dim`-component vectors.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            sums: vec![0; dim],
            count: 0,
        }
    }

    /// Number of vectors added so far.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Check whether nothing has been added.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Add a vector with weight 1.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the vector has the wrong length.
    pub fn add(&mut self, v: &Hypervector) -> Result<()> {
        self.add_weighted(v, 1)
    }

    /// Add a vector with an integer weight.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the vector has the wrong length.
    pub fn add_weighted(&mut self, v: &Hypervector, weight: i64) -> Result<()> {
        if v.len() != self.sums.len() {
            return Err(VsaError::DimensionMismatch {
                expected: self.sums.len(),
                actual: v.len(),
            });
        }

        for (w, (&p, &m)) in v.plus_plane().iter().zip(v.minus_plane()).enumerate() {
            let base = w * 32;
            let mut bits = p;
            while bits != 0 {
                self.sums[base + bits.trailing_zeros() as usize] += weight;
                bits &= bits - 1;
            }
            let mut bits = m;
            while bits != 0 {
                self.sums[base + bits.trailing_zeros() as usize] -= weight;
                bits &= bits - 1;
            }
        }
        self.count += 1;
        Ok(())
    }

    /// Threshold the running totals into a hypervector.
    #[must_use]
    pub fn finish(&self) -> Hypervector {
        let mut out = Hypervector::zeros(self.sums.len());
        for (i, &s) in self.sums.iter().enumerate() {
            let t = Trit::from_sign(s);
            if !t.is_zero() {
                out.set(i, t);
            }
        }
        out
    }
}

/// Bundle vectors with equal weight.
///
/// # Errors
///
/// Returns `EmptyInput` for an empty list and `DimensionMismatch` if the
/// vectors differ in length.
pub fn bundle(vectors: &[&Hypervector]) -> Result<Hypervector> {
    let first = vectors.first().ok_or(VsaError::EmptyInput)?;
    let mut bundler = Bundler::new(first.len());
    for v in vectors {
        bundler.add(v)?;
    }
    Ok(bundler.finish())
}
