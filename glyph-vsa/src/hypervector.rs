//! Bitsliced ternary hypervector.
//!
//! Each component is stored as two bits across separate "plus" and "minus"
//! planes:
//!
//! ```text
//! Value | +plane | -plane
//! ------+--------+-------
//!   +1  |   1    |   0
//!    0  |   0    |   0
//!   -1  |   0    |   1
//! ```
//!
//! Bits past `len()` in the last word are always zero. Every constructor and
//! mutator keeps that invariant, which lets popcount-based operations skip
//! padding correction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, VsaError};
use crate::trit::Trit;

/// A fixed-dimension ternary hypervector.
///
/// # Examples
///
/// ```
/// use glyph_vsa::{Hypervector, Trit};
///
/// let mut v = Hypervector::zeros(100);
/// v.set(0, Trit::P);
/// v.set(1, Trit::N);
///
/// assert_eq!(v.get(0), Trit::P);
/// assert_eq!(v.get(2), Trit::Z);
/// assert_eq!(v.count_nonzero(), 2);
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "RawPlanes")]
pub struct Hypervector {
    plus: Vec<u32>,
    minus: Vec<u32>,
    dim: usize,
}

/// Unvalidated wire form; deserialization goes through `from_planes`.
#[derive(Deserialize)]
struct RawPlanes {
    plus: Vec<u32>,
    minus: Vec<u32>,
    dim: usize,
}

impl TryFrom<RawPlanes> for Hypervector {
    type Error = VsaError;

    fn try_from(raw: RawPlanes) -> Result<Self> {
        Hypervector::from_planes(raw.plus, raw.minus, raw.dim)
    }
}

/// Mask of the valid bits in the last word of a `dim`-component vector.
pub(crate) fn tail_mask(dim: usize) -> u32 {
    match dim % 32 {
        0 => u32::MAX,
        r => (1u32 << r) - 1,
    }
}

impl Hypervector {
    /// Create an all-zero hypervector.
    #[must_use]
    pub fn zeros(dim: usize) -> Self {
        let words = dim.div_ceil(32);
        Self {
            plus: vec![0u32; words],
            minus: vec![0u32; words],
            dim,
        }
    }

    /// Create from existing planes.
    ///
    /// # Errors
    ///
    /// Returns `PlaneLength` if the planes have the wrong word count,
    /// `PlaneOverlap` if a component is set in both planes, and `PaddingBits`
    /// if a bit past the last component is set.
    pub fn from_planes(plus: Vec<u32>, minus: Vec<u32>, dim: usize) -> Result<Self> {
        let expected_words = dim.div_ceil(32);
        if plus.len() != expected_words || minus.len() != expected_words {
            return Err(VsaError::PlaneLength {
                expected_words,
                plus_words: plus.len(),
                minus_words: minus.len(),
                dim,
            });
        }
        if let Some((word, overlap)) = plus
            .iter()
            .zip(&minus)
            .map(|(p, m)| p & m)
            .enumerate()
            .find(|&(_, overlap)| overlap != 0)
        {
            return Err(VsaError::PlaneOverlap {
                position: word * 32 + overlap.trailing_zeros() as usize,
            });
        }
        if let (Some(&p), Some(&m)) = (plus.last(), minus.last()) {
            if (p | m) & !tail_mask(dim) != 0 {
                return Err(VsaError::PaddingBits { dim });
            }
        }
        Ok(Self { plus, minus, dim })
    }

    /// Create from a slice of trits.
    #[must_use]
    pub fn from_trits(trits: &[Trit]) -> Self {
        let mut v = Self::zeros(trits.len());
        for (i, &t) in trits.iter().enumerate() {
            v.set(i, t);
        }
        v
    }

    /// Create from integer values (-1, 0, +1).
    ///
    /// # Errors
    ///
    /// Returns error if any value is not -1, 0, or +1.
    pub fn from_i8_slice(values: &[i8]) -> Result<Self> {
        let mut v = Self::zeros(values.len());
        for (i, &x) in values.iter().enumerate() {
            v.set(i, Trit::from_value(i32::from(x))?);
        }
        Ok(v)
    }

    /// Number of components.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.dim
    }

    /// Check if the vector has no components.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.dim == 0
    }

    /// Number of u32 words per plane.
    #[must_use]
    pub fn num_words(&self) -> usize {
        self.plus.len()
    }

    /// Set a component.
    ///
    /// # Panics
    ///
    /// Panics if `dim >= len()`.
    pub fn set(&mut self, dim: usize, value: Trit) {
        assert!(dim < self.dim, "dimension out of bounds");

        let word = dim / 32;
        let mask = 1u32 << (dim % 32);

        self.plus[word] &= !mask;
        self.minus[word] &= !mask;

        match value {
            Trit::P => self.plus[word] |= mask,
            Trit::N => self.minus[word] |= mask,
            Trit::Z => {}
        }
    }

    /// Get a component.
    ///
    /// # Panics
    ///
    /// Panics if `dim >= len()`.
    #[must_use]
    pub fn get(&self, dim: usize) -> Trit {
        assert!(dim < self.dim, "dimension out of bounds");

        let word = dim / 32;
        let mask = 1u32 << (dim % 32);

        Trit::from_bits(self.plus[word] & mask != 0, self.minus[word] & mask != 0)
    }

    /// Negate one component in place.
    ///
    /// # Panics
    ///
    /// Panics if `dim >= len()`.
    pub fn negate_at(&mut self, dim: usize) {
        assert!(dim < self.dim, "dimension out of bounds");

        let word = dim / 32;
        let mask = 1u32 << (dim % 32);
        let p = self.plus[word] & mask;
        let m = self.minus[word] & mask;

        self.plus[word] = (self.plus[word] & !mask) | m;
        self.minus[word] = (self.minus[word] & !mask) | p;
    }

    /// Count non-zero components.
    #[must_use]
    pub fn count_nonzero(&self) -> usize {
        self.plus
            .iter()
            .zip(&self.minus)
            .map(|(p, m)| (p | m).count_ones() as usize)
            .sum()
    }

    /// Check whether every component is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.plus.iter().chain(&self.minus).all(|w| *w == 0)
    }

    /// Check whether every component is non-zero (a bipolar vector).
    #[must_use]
    pub fn is_dense(&self) -> bool {
        self.count_nonzero() == self.dim
    }

    /// Dot product via popcount.
    ///
    /// ```text
    /// dot = popcount(a+ & b+) + popcount(a- & b-)
    ///     - popcount(a+ & b-) - popcount(a- & b+)
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the vectors differ in length.
    pub fn dot(&self, other: &Hypervector) -> Result<i64> {
        self.check_dim(other)?;

        let mut result: i64 = 0;
        for i in 0..self.num_words() {
            let agree = (self.plus[i] & other.plus[i]) | (self.minus[i] & other.minus[i]);
            let disagree = (self.plus[i] & other.minus[i]) | (self.minus[i] & other.plus[i]);
            result += i64::from(agree.count_ones()) - i64::from(disagree.count_ones());
        }
        Ok(result)
    }

    /// Element-wise product.
    ///
    /// Positive where both signs agree, negative where they differ, zero if
    /// either side is zero.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the vectors differ in length.
    pub fn product(&self, other: &Hypervector) -> Result<Hypervector> {
        self.check_dim(other)?;

        let mut out = Self::zeros(self.dim);
        for i in 0..self.num_words() {
            out.plus[i] = (self.plus[i] & other.plus[i]) | (self.minus[i] & other.minus[i]);
            out.minus[i] = (self.plus[i] & other.minus[i]) | (self.minus[i] & other.plus[i]);
        }
        Ok(out)
    }

    /// Return a negated copy.
    #[must_use]
    pub fn negated(&self) -> Self {
        Self {
            plus: self.minus.clone(),
            minus: self.plus.clone(),
            dim: self.dim,
        }
    }

    /// Positive plane words.
    #[must_use]
    pub fn plus_plane(&self) -> &[u32] {
        &self.plus
    }

    /// Negative plane words.
    #[must_use]
    pub fn minus_plane(&self) -> &[u32] {
        &self.minus
    }

    /// Convert to integer values.
    #[must_use]
    pub fn to_i8_vec(&self) -> Vec<i8> {
        (0..self.dim).map(|i| self.get(i).value()).collect()
    }

    pub(crate) fn check_dim(&self, other: &Hypervector) -> Result<()> {
        if self.dim == other.dim {
            Ok(())
        } else {
            Err(VsaError::DimensionMismatch {
                expected: self.dim,
                actual: other.dim,
            })
        }
    }

    pub(crate) fn planes_mut(&mut self) -> (&mut [u32], &mut [u32]) {
        (&mut self.plus, &mut self.minus)
    }
}

impl fmt::Debug for Hypervector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Hypervector(dims={}, nonzero={})",
            self.dim,
            self.count_nonzero()
        )
    }
}

impl PartialEq for Hypervector {
    fn eq(&self, other: &Self) -> bool {
        self.dim == other.dim && self.plus == other.plus && self.minus == other.minus
    }
}

impl Eq for Hypervector {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let v = Hypervector::zeros(100);
        assert_eq!(v.len(), 100);
        assert_eq!(v.num_words(), 4);
        assert!(v.is_zero());
    }

    #[test]
    fn test_set_get_overwrite() {
        let mut v = Hypervector::zeros(40);
        v.set(0, Trit::P);
        v.set(39, Trit::N);
        assert_eq!(v.get(0), Trit::P);
        assert_eq!(v.get(39), Trit::N);

        v.set(0, Trit::N);
        assert_eq!(v.get(0), Trit::N);
        v.set(0, Trit::Z);
        assert_eq!(v.get(0), Trit::Z);
    }

    #[test]
    fn test_negate_at() {
        let mut v = Hypervector::from_trits(&[Trit::P, Trit::N, Trit::Z]);
        v.negate_at(0);
        v.negate_at(1);
        v.negate_at(2);
        assert_eq!(v.to_i8_vec(), vec![-1, 1, 0]);
    }

    #[test]
    fn test_dot_product() {
        // a = [1, -1, 0, 1], b = [1, 1, -1, 0]
        let a = Hypervector::from_i8_slice(&[1, -1, 0, 1]).unwrap();
        let mut b = Hypervector::from_i8_slice(&[1, 1, -1, 0]).unwrap();
        assert_eq!(a.dot(&b).unwrap(), 0);

        b.set(1, Trit::N);
        assert_eq!(a.dot(&b).unwrap(), 2);
    }

    #[test]
    fn test_dot_dimension_mismatch() {
        let a = Hypervector::zeros(10);
        let b = Hypervector::zeros(11);
        assert!(matches!(
            a.dot(&b),
            Err(VsaError::DimensionMismatch {
                expected: 10,
                actual: 11
            })
        ));
    }

    #[test]
    fn test_product_matches_trit_product() {
        let a = Hypervector::from_i8_slice(&[1, 1, 1, -1, -1, -1, 0, 0, 0]).unwrap();
        let b = Hypervector::from_i8_slice(&[1, -1, 0, 1, -1, 0, 1, -1, 0]).unwrap();
        let c = a.product(&b).unwrap();
        assert_eq!(c.to_i8_vec(), vec![1, -1, 0, -1, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_from_planes_rejects_overlap_and_padding() {
        assert!(matches!(
            Hypervector::from_planes(vec![0, 1 << 3], vec![0, 1 << 3], 40),
            Err(VsaError::PlaneOverlap { position: 35 })
        ));
        assert!(matches!(
            Hypervector::from_planes(vec![1 << 5], vec![0], 4),
            Err(VsaError::PaddingBits { dim: 4 })
        ));
        assert!(Hypervector::from_planes(vec![0b0101], vec![0b1010], 4).is_ok());
        assert!(matches!(
            Hypervector::from_planes(vec![0, 0], vec![0], 40),
            Err(VsaError::PlaneLength {
                expected_words: 2,
                plus_words: 2,
                minus_words: 1,
                dim: 40,
            })
        ));
    }

    #[test]
    fn test_dense() {
        let v = Hypervector::from_i8_slice(&[1, -1, 1]).unwrap();
        assert!(v.is_dense());
        assert!(!Hypervector::zeros(3).is_dense());
    }

    #[test]
    fn test_planes_roundtrip() {
        let v = Hypervector::from_i8_slice(&[1, -1, 0, 1, 1]).unwrap();
        let back =
            Hypervector::from_planes(v.plus_plane().to_vec(), v.minus_plane().to_vec(), v.len())
                .unwrap();
        assert_eq!(back, v);
    }
}
