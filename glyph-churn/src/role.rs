//! Role definitions and the numeric binning policy.
//!
//! A role is a named attribute slot. Roles are declared once per model
//! version in [`ModelConfig`](crate::ModelConfig) and frozen into a
//! [`RoleSet`] when the model loads.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{GlyphError, Result};

/// Relative slack applied before flooring a bin position. Covers the few
/// ulps lost when a decimal edge such as `0.3 / 0.1` is divided out, and
/// nothing wider: a value a hair below an edge stays in the lower bin.
const EDGE_ULPS: f64 = 4.0 * f64::EPSILON;

/// Numeric range and bin width of a numeric role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSpec {
    /// Lower bound; smaller values clamp here.
    pub min: f64,
    /// Upper bound; larger values clamp here.
    pub max: f64,
    /// Width of one bin.
    pub bin_width: f64,
    /// Value substituted when a training entry omits the field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<f64>,
}

impl NumericSpec {
    /// Create a spec without a default.
    #[must_use]
    pub const fn new(min: f64, max: f64, bin_width: f64) -> Self {
        Self {
            min,
            max,
            bin_width,
            default: None,
        }
    }

    /// Set the training-side default.
    #[must_use]
    pub const fn with_default(mut self, default: f64) -> Self {
        self.default = Some(default);
        self
    }

    /// Number of bins, `floor((max - min) / bin_width) + 1`.
    #[must_use]
    pub fn num_bins(&self) -> usize {
        (((self.max - self.min) / self.bin_width) * (1.0 + EDGE_ULPS)).floor() as usize + 1
    }

    /// Clamp a value into `[min, max]`.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Check whether a value lies inside `[min, max]`.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Bin index of a value after clamping.
    ///
    /// Edges belong to the upper bin. The position is floored after a
    /// relative slack of a few ulps, so only float rounding moves a value
    /// across an edge.
    ///
    /// # Examples
    ///
    /// ```
    /// use glyph_churn::NumericSpec;
    ///
    /// let logins = NumericSpec::new(0.0, 200.0, 10.0);
    /// assert_eq!(logins.bin_index(0.0), 0);
    /// assert_eq!(logins.bin_index(59.9), 5);
    /// assert_eq!(logins.bin_index(200.0), 20);
    /// assert_eq!(logins.bin_index(500.0), 20);
    /// assert_eq!(logins.bin_index(-3.0), 0);
    /// ```
    #[must_use]
    pub fn bin_index(&self, value: f64) -> usize {
        let offset = (self.clamp(value) - self.min) / self.bin_width;
        ((offset * (1.0 + EDGE_ULPS)).floor() as usize).min(self.num_bins() - 1)
    }

    fn validate(&self, role: &str) -> Result<()> {
        if !(self.min.is_finite() && self.max.is_finite() && self.bin_width.is_finite()) {
            return Err(GlyphError::Config(format!(
                "role {role}: numeric bounds must be finite"
            )));
        }
        if self.min >= self.max {
            return Err(GlyphError::Config(format!(
                "role {role}: min ({}) must be below max ({})",
                self.min, self.max
            )));
        }
        if self.bin_width <= 0.0 {
            return Err(GlyphError::Config(format!(
                "role {role}: bin_width must be > 0"
            )));
        }
        if let Some(d) = self.default {
            if !self.contains(d) {
                return Err(GlyphError::Config(format!(
                    "role {role}: default {d} lies outside [{}, {}]",
                    self.min, self.max
                )));
            }
        }
        Ok(())
    }
}

/// What kind of value a role holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoleKind {
    /// One of an enumerated set of labels.
    Categorical {
        /// Allowed labels, in declaration order.
        values: Vec<String>,
    },
    /// A scalar, clamped and binned.
    Numeric(NumericSpec),
    /// Entity key. Forms temporal identity and is never bound into vectors.
    TextKey,
}

impl RoleKind {
    /// Short kind name for messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            RoleKind::Categorical { .. } => "categorical",
            RoleKind::Numeric(_) => "numeric",
            RoleKind::TextKey => "text-key",
        }
    }
}

fn default_weight() -> f32 {
    1.0
}

/// A named attribute slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    /// Unique role name.
    pub name: String,
    /// Value kind and its parameters.
    pub kind: RoleKind,
    /// Layer this role is bundled into, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    /// Bundling weight.
    #[serde(default = "default_weight")]
    pub weight: f32,
    /// Training records must carry this role.
    #[serde(default)]
    pub required: bool,
    /// Synonyms for an external query parser. Never encoded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lexicons: Vec<String>,
}

impl Role {
    /// Categorical role.
    pub fn categorical<S: Into<String>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::with_kind(
            name,
            RoleKind::Categorical {
                values: values.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// Numeric role.
    pub fn numeric(name: impl Into<String>, spec: NumericSpec) -> Self {
        Self::with_kind(name, RoleKind::Numeric(spec))
    }

    /// Text-key role.
    pub fn text_key(name: impl Into<String>) -> Self {
        Self::with_kind(name, RoleKind::TextKey)
    }

    fn with_kind(name: impl Into<String>, kind: RoleKind) -> Self {
        Self {
            name: name.into(),
            kind,
            layer: None,
            weight: 1.0,
            required: false,
            lexicons: Vec::new(),
        }
    }

    /// Assign a layer.
    #[must_use]
    pub fn in_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    /// Set the bundling weight.
    #[must_use]
    pub const fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    /// Mark as required on training records.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach query lexicons.
    #[must_use]
    pub fn with_lexicons<S: Into<String>>(
        mut self,
        lexicons: impl IntoIterator<Item = S>,
    ) -> Self {
        self.lexicons = lexicons.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the role is bound into vectors.
    #[must_use]
    pub const fn is_encoded(&self) -> bool {
        !matches!(self.kind, RoleKind::TextKey)
    }

    /// Weight in thousandths, the unit of the integer bundle accumulator.
    #[must_use]
    pub fn weight_milli(&self) -> i64 {
        (f64::from(self.weight) * 1000.0).round() as i64
    }

    /// Numeric spec, if numeric.
    #[must_use]
    pub const fn numeric_spec(&self) -> Option<&NumericSpec> {
        match &self.kind {
            RoleKind::Numeric(spec) => Some(spec),
            _ => None,
        }
    }

    /// Enumerated values, if categorical.
    #[must_use]
    pub fn categories(&self) -> Option<&[String]> {
        match &self.kind {
            RoleKind::Categorical { values } => Some(values),
            _ => None,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(GlyphError::Config("role name must not be empty".into()));
        }
        if !(self.weight.is_finite() && self.weight > 0.0) || self.weight_milli() == 0 {
            return Err(GlyphError::Config(format!(
                "role {}: weight must be a positive number of at least 0.001",
                self.name
            )));
        }
        match &self.kind {
            RoleKind::Categorical { values } => {
                if values.is_empty() {
                    return Err(GlyphError::Config(format!(
                        "role {}: categorical role needs at least one value",
                        self.name
                    )));
                }
                for (i, v) in values.iter().enumerate() {
                    if v.is_empty() {
                        return Err(GlyphError::Config(format!(
                            "role {}: empty category label",
                            self.name
                        )));
                    }
                    if values[..i].contains(v) {
                        return Err(GlyphError::Config(format!(
                            "role {}: duplicate category {v:?}",
                            self.name
                        )));
                    }
                }
                Ok(())
            }
            RoleKind::Numeric(spec) => spec.validate(&self.name),
            RoleKind::TextKey => Ok(()),
        }
    }
}

/// Frozen, validated set of roles for one model version.
#[derive(Debug, Clone)]
pub struct RoleSet {
    roles: Vec<Role>,
    index: HashMap<String, usize>,
    key_role: Option<usize>,
}

impl RoleSet {
    /// Validate and index a role list.
    ///
    /// # Errors
    ///
    /// Returns `Config` for an invalid role, a duplicate name, or more than
    /// one text-key role.
    pub fn new(roles: Vec<Role>) -> Result<Self> {
        let mut index = HashMap::with_capacity(roles.len());
        let mut key_role = None;

        for (i, role) in roles.iter().enumerate() {
            role.validate()?;
            if index.insert(role.name.clone(), i).is_some() {
                return Err(GlyphError::Config(format!(
                    "duplicate role name {:?}",
                    role.name
                )));
            }
            if matches!(role.kind, RoleKind::TextKey) {
                if key_role.is_some() {
                    return Err(GlyphError::Config(
                        "at most one text-key role is allowed".into(),
                    ));
                }
                key_role = Some(i);
            }
        }

        Ok(Self {
            roles,
            index,
            key_role,
        })
    }

    /// Look up a role by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Role> {
        self.index.get(name).map(|&i| &self.roles[i])
    }

    /// Look up a role by name, failing with `UnknownRole`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRole` if no role has this name.
    pub fn require(&self, name: &str) -> Result<&Role> {
        self.get(name)
            .ok_or_else(|| GlyphError::UnknownRole(name.to_string()))
    }

    /// The text-key role, if declared.
    #[must_use]
    pub fn key_role(&self) -> Option<&Role> {
        self.key_role.map(|i| &self.roles[i])
    }

    /// Roles in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter()
    }

    /// Roles that are bound into vectors, in declaration order.
    pub fn encoded(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter().filter(|r| r.is_encoded())
    }

    /// Number of roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Check if there are no roles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Owned copy of the role list.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Role> {
        self.roles.clone()
    }
}
