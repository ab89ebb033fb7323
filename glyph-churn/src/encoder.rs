//! Record encoding by role-filler binding and weighted bundling.
//!
//! ```text
//! glyph = sign( sum_r  weight_r * (role_r (*) value_r) )
//! ```
//!
//! `(*)` is element-wise multiplication. Roles are visited in declaration
//! order and the sum is exact integer arithmetic on milli-weights, so the
//! result does not depend on thread scheduling or field order.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use glyph_vsa::vsa::{bind, cosine_similarity, unbind, Bundler};
use glyph_vsa::Hypervector;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GlyphError, Result};
use crate::record::{FieldValue, LabelField, PatternAnnotation, Record, TrainingEntry};
use crate::role::{RoleKind, RoleSet};
use crate::symbols::{SymbolSpace, SymbolValue};

/// An encoded record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    vector: Hypervector,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    layers: BTreeMap<String, Hypervector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
    roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    annotation: Option<PatternAnnotation>,
}

impl Glyph {
    /// Bundled vector over every bound role.
    #[must_use]
    pub const fn vector(&self) -> &Hypervector {
        &self.vector
    }

    /// Per-layer vectors, for layers with at least one bound role.
    #[must_use]
    pub const fn layers(&self) -> &BTreeMap<String, Hypervector> {
        &self.layers
    }

    /// Vector of one layer.
    #[must_use]
    pub fn layer(&self, name: &str) -> Option<&Hypervector> {
        self.layers.get(name)
    }

    /// Entity key, if the record carried one.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Snapshot timestamp, if assigned.
    #[must_use]
    pub const fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Names of the roles bound into the vector, in declaration order.
    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Training metadata.
    #[must_use]
    pub const fn annotation(&self) -> Option<&PatternAnnotation> {
        self.annotation.as_ref()
    }

    /// Dimensionality.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.vector.len()
    }

    /// Copy of this glyph stamped with a timestamp.
    #[must_use]
    pub(crate) fn at(&self, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..self.clone()
        }
    }

    #[cfg(test)]
    pub(crate) fn with_annotation(mut self, annotation: PatternAnnotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    /// Wrap a raw vector as a query glyph with no metadata.
    #[must_use]
    pub fn from_vector(vector: Hypervector) -> Self {
        Self {
            vector,
            layers: BTreeMap::new(),
            key: None,
            timestamp: None,
            roles: Vec::new(),
            annotation: None,
        }
    }
}

/// Best cleanup match for an unbound role.
#[derive(Debug, Clone)]
pub struct DecodedRole {
    /// Decoded value.
    pub value: SymbolValue,
    /// Cosine between the unbound probe and the value symbol.
    pub score: f32,
    /// The value symbol itself.
    pub symbol: Arc<Hypervector>,
}

/// Turns records into glyphs.
#[derive(Debug, Clone)]
pub struct Encoder {
    symbols: Arc<SymbolSpace>,
    encode_labels: bool,
}

impl Encoder {
    /// Create an encoder over a symbol space.
    #[must_use]
    pub fn new(symbols: Arc<SymbolSpace>) -> Self {
        Self {
            symbols,
            encode_labels: false,
        }
    }

    /// Bind training labels into patterns as categorical roles.
    #[must_use]
    pub fn with_encode_labels(mut self, encode: bool) -> Self {
        self.encode_labels = encode;
        self
    }

    /// The symbol space.
    #[must_use]
    pub fn symbols(&self) -> &Arc<SymbolSpace> {
        &self.symbols
    }

    /// The role set.
    #[must_use]
    pub fn roles(&self) -> &RoleSet {
        self.symbols.roles()
    }

    /// Dimensionality of produced vectors.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.symbols.dimension()
    }

    /// Encode a record.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRole` for a field no role declares, `TypeMismatch`
    /// for a value of the wrong kind or a non-finite number,
    /// `UnknownCategory` for a label outside its enumeration, and
    /// `EmptyRecord` when no encodable role is present.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use glyph_churn::{Encoder, ModelConfig, Record, SymbolSpace};
    ///
    /// # fn main() -> glyph_churn::Result<()> {
    /// let symbols = Arc::new(SymbolSpace::new(&ModelConfig::churn().with_dimension(2048))?);
    /// let encoder = Encoder::new(symbols);
    /// let record = Record::new()
    ///     .with_key("customer_id", "acme")
    ///     .with_numeric("logins", 0.0);
    /// let glyph = encoder.encode(&record)?;
    /// assert_eq!(glyph.key(), Some("acme"));
    /// assert_eq!(glyph.roles(), ["logins"]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn encode(&self, record: &Record) -> Result<Glyph> {
        self.encode_inner(record, None, None)
    }

    /// Encode a record as a snapshot at `timestamp`.
    ///
    /// # Errors
    ///
    /// Same as [`Encoder::encode`].
    pub fn encode_at(&self, record: &Record, timestamp: DateTime<Utc>) -> Result<Glyph> {
        self.encode_inner(record, Some(timestamp), None)
    }

    /// Encode a labeled training entry.
    ///
    /// Missing numeric fields take their role default. Labels are checked
    /// against their categorical roles and bound only when label encoding is
    /// on.
    ///
    /// # Errors
    ///
    /// Returns `EmptyRecord` when the entry carries nothing encodable,
    /// `MissingRole` when a required role is still absent after defaults,
    /// plus everything [`Encoder::encode`] returns.
    pub fn encode_pattern(&self, entry: &TrainingEntry) -> Result<Glyph> {
        let roles = self.roles();
        let labels = &entry.annotation.labels;
        labels.validate(roles)?;

        let mut record = entry.record.clone();
        if self.encode_labels {
            for field in LabelField::ALL {
                let is_categorical = roles
                    .get(field.as_str())
                    .is_some_and(|r| r.categories().is_some());
                if is_categorical && !record.contains(field.as_str()) {
                    record.insert(
                        field.as_str(),
                        FieldValue::Category(labels.get(field).into()),
                    );
                }
            }
        }

        if !roles.encoded().any(|r| record.contains(&r.name)) {
            return Err(GlyphError::EmptyRecord);
        }

        for role in roles.iter() {
            if record.contains(&role.name) {
                continue;
            }
            if let Some(default) = role.numeric_spec().and_then(|s| s.default) {
                record.insert(role.name.clone(), FieldValue::Numeric(default));
            } else if role.required {
                return Err(GlyphError::MissingRole(role.name.clone()));
            }
        }

        self.encode_inner(&record, None, Some(entry.annotation.clone()))
    }

    fn encode_inner(
        &self,
        record: &Record,
        timestamp: Option<DateTime<Utc>>,
        annotation: Option<PatternAnnotation>,
    ) -> Result<Glyph> {
        let roles = self.roles();
        for (name, _) in record.iter() {
            roles.require(name)?;
        }

        let dim = self.dimension();
        let mut global = Bundler::new(dim);
        let mut layers: BTreeMap<String, Bundler> = BTreeMap::new();
        let mut bound_roles = Vec::new();
        let mut key = None;

        for role in roles.iter() {
            let Some(value) = record.get(&role.name) else {
                continue;
            };

            let filler = match (&role.kind, value) {
                (RoleKind::TextKey, FieldValue::Key(k)) => {
                    key = Some(k.clone());
                    continue;
                }
                (RoleKind::Categorical { values }, FieldValue::Category(label)) => {
                    if !values.iter().any(|v| v == label) {
                        return Err(GlyphError::UnknownCategory {
                            role: role.name.clone(),
                            value: label.clone(),
                        });
                    }
                    self.symbols.category_symbol(&role.name, label)?
                }
                (RoleKind::Numeric(spec), FieldValue::Numeric(v)) => {
                    if !v.is_finite() {
                        return Err(GlyphError::TypeMismatch {
                            role: role.name.clone(),
                            expected: "finite number",
                            found: v.to_string(),
                        });
                    }
                    self.symbols.bin_symbol(&role.name, spec.bin_index(*v))?
                }
                (kind, other) => {
                    return Err(GlyphError::TypeMismatch {
                        role: role.name.clone(),
                        expected: kind.name(),
                        found: other.kind_name().into(),
                    })
                }
            };

            let role_key = self.symbols.role_symbol(&role.name)?;
            let bound = bind(&role_key, &filler)?;
            let weight = role.weight_milli();
            global.add_weighted(&bound, weight)?;
            if let Some(layer) = &role.layer {
                layers
                    .entry(layer.clone())
                    .or_insert_with(|| Bundler::new(dim))
                    .add_weighted(&bound, weight)?;
            }
            bound_roles.push(role.name.clone());
        }

        if bound_roles.is_empty() {
            return Err(GlyphError::EmptyRecord);
        }

        debug!(key = ?key, roles = bound_roles.len(), "encoded record");

        Ok(Glyph {
            vector: global.finish(),
            layers: layers
                .into_iter()
                .map(|(name, bundler)| (name, bundler.finish()))
                .collect(),
            key,
            timestamp,
            roles: bound_roles,
            annotation,
        })
    }

    /// Recover the value a vector holds for one role.
    ///
    /// Unbinds the role key and returns the candidate value symbol closest to
    /// the probe. Ties go to the earlier candidate.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRole`, `OutOfDomain` for a text-key role, or
    /// `DimensionMismatch`.
    pub fn decode_role(&self, vector: &Hypervector, role: &str) -> Result<DecodedRole> {
        let probe = self.unbind_role(vector, role)?;
        self.cleanup(&probe, role)
    }

    /// Unbind a role key from a vector, leaving a noisy copy of its value.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRole` or `DimensionMismatch`.
    pub fn unbind_role(&self, vector: &Hypervector, role: &str) -> Result<Hypervector> {
        if vector.len() != self.dimension() {
            return Err(GlyphError::DimensionMismatch {
                expected: self.dimension(),
                actual: vector.len(),
            });
        }
        let role_key = self.symbols.role_symbol(role)?;
        Ok(unbind(vector, &role_key)?)
    }

    /// Nearest value symbol of a role to an unbound probe.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRole`, `OutOfDomain` for a text-key role, or
    /// `DimensionMismatch`.
    pub fn cleanup(&self, probe: &Hypervector, role: &str) -> Result<DecodedRole> {
        let mut best: Option<DecodedRole> = None;
        for (value, symbol) in self.symbols.candidates(role)? {
            let score = cosine_similarity(probe, &symbol)?;
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(DecodedRole {
                    value,
                    score,
                    symbol,
                });
            }
        }
        best.ok_or_else(|| GlyphError::OutOfDomain {
            role: role.into(),
            value: "<any>".into(),
        })
    }
}
