//! Bind operation (element-wise product).
//!
//! Binding a role key with a filler yields a vector dissimilar to both.
//! Because every component of an atomic key is ±1, binding again with the
//! same key restores the filler: `unbind(bind(a, k), k) == a`.

use crate::error::{Result, VsaError};
use crate::hypervector::Hypervector;

/// Bind two vectors element-wise.
///
/// # Errors
///
/// Returns `DimensionMismatch` if the vectors differ in length.
///
/// # Examples
///
/// ```
/// use glyph_vsa::{Hypervector, vsa::{bind, unbind}};
///
/// let a = Hypervector::from_i8_slice(&[1, -1, 0, 1]).unwrap();
/// let key = Hypervector::from_i8_slice(&[-1, -1, 1, 1]).unwrap();
///
/// let bound = bind(&a, &key).unwrap();
/// assert_eq!(unbind(&bound, &key).unwrap(), a);
/// ```
pub fn bind(a: &Hypervector, b: &Hypervector) -> Result<Hypervector> {
    a.product(b)
}

/// Unbind a vector with the key it was bound to.
///
/// Identical to [`bind`]; exact recovery requires a dense key.
///
/// # Errors
///
/// Returns `DimensionMismatch` if the vectors differ in length.
pub fn unbind(bound: &Hypervector, key: &Hypervector) -> Result<Hypervector> {
    bound.product(key)
}

/// Bind several vectors left to right.
///
/// # Errors
///
/// Returns `EmptyInput` for an empty list and `DimensionMismatch` if the
/// vectors differ in length.
pub fn bind_many(vectors: &[&Hypervector]) -> Result<Hypervector> {
    let (first, rest) = vectors.split_first().ok_or(VsaError::EmptyInput)?;
    rest.iter()
        .try_fold((*first).clone(), |acc, v| bind(&acc, v))
}
