//! Read-only collection of encoded training patterns.

use glyph_vsa::Hypervector;
use rayon::prelude::*;
use tracing::info;

use crate::encoder::{Encoder, Glyph};
use crate::error::{GlyphError, Result};
use crate::record::TrainingEntry;

/// Ordered training glyphs. Insertion order is the ranking tie-break.
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    glyphs: Vec<Glyph>,
    dimension: usize,
}

impl PatternLibrary {
    /// Encode every entry in parallel, preserving entry order.
    ///
    /// # Errors
    ///
    /// Returns the first encoding error in entry order.
    pub fn build(encoder: &Encoder, entries: &[TrainingEntry]) -> Result<Self> {
        let glyphs = entries
            .par_iter()
            .map(|entry| encoder.encode_pattern(entry))
            .collect::<Vec<_>>()
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        info!(patterns = glyphs.len(), dimension = encoder.dimension(), "built pattern library");

        Ok(Self {
            glyphs,
            dimension: encoder.dimension(),
        })
    }

    /// Wrap already encoded glyphs.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if a glyph's layers or vector disagree
    /// with `dimension`.
    pub fn from_glyphs(dimension: usize, glyphs: Vec<Glyph>) -> Result<Self> {
        for glyph in &glyphs {
            let dims = std::iter::once(glyph.vector()).chain(glyph.layers().values());
            for v in dims {
                if v.len() != dimension {
                    return Err(GlyphError::DimensionMismatch {
                        expected: dimension,
                        actual: v.len(),
                    });
                }
            }
        }
        Ok(Self { glyphs, dimension })
    }

    /// All patterns in insertion order.
    #[must_use]
    pub fn all(&self) -> &[Glyph] {
        &self.glyphs
    }

    /// Iterate patterns in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Glyph> {
        self.glyphs.iter()
    }

    /// Pattern at an index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Glyph> {
        self.glyphs.get(index)
    }

    /// Number of patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    /// Check if there are no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Dimensionality shared by every pattern.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Index of the first pattern whose vector equals `vector` exactly.
    #[must_use]
    pub fn find(&self, vector: &Hypervector) -> Option<usize> {
        self.glyphs.iter().position(|g| g.vector() == vector)
    }
}

impl<'a> IntoIterator for &'a PatternLibrary {
    type Item = &'a Glyph;
    type IntoIter = std::slice::Iter<'a, Glyph>;

    fn into_iter(self) -> Self::IntoIter {
        self.glyphs.iter()
    }
}
