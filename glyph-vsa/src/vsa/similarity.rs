//! Similarity measures for ternary hypervectors.

use crate::error::Result;
use crate::hypervector::Hypervector;

/// Cosine similarity in [-1, 1].
///
/// For ternary vectors the norm is `sqrt(count_nonzero)`. An all-zero side
/// has similarity 0 with everything.
///
/// # Errors
///
/// Returns `DimensionMismatch` if the vectors differ in length.
///
/// # Examples
///
/// ```
/// use glyph_vsa::{Hypervector, vsa::cosine_similarity};
///
/// let a = Hypervector::from_i8_slice(&[1, 1, 0, -1]).unwrap();
/// let sim = cosine_similarity(&a, &a).unwrap();
/// assert!((sim - 1.0).abs() < 1e-6);
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn cosine_similarity(a: &Hypervector, b: &Hypervector) -> Result<f32> {
    let dot = a.dot(b)? as f64;
    let norm_a = (a.count_nonzero() as f64).sqrt();
    let norm_b = (b.count_nonzero() as f64).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a * norm_b)) as f32)
}

/// Number of positions where the vectors differ.
///
/// # Errors
///
/// Returns `DimensionMismatch` if the vectors differ in length.
pub fn hamming_distance(a: &Hypervector, b: &Hypervector) -> Result<usize> {
    a.check_dim(b)?;

    Ok(a.plus_plane()
        .iter()
        .zip(b.plus_plane())
        .zip(a.minus_plane().iter().zip(b.minus_plane()))
        .map(|((ap, bp), (am, bm))| ((ap ^ bp) | (am ^ bm)).count_ones() as usize)
        .sum())
}
