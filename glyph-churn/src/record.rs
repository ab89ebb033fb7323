//! Structured records, training labels and pattern metadata.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{GlyphError, Result};
use crate::role::{RoleKind, RoleSet};

/// A tagged field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Label of a categorical role.
    Category(String),
    /// Raw value of a numeric role.
    Numeric(f64),
    /// Entity key.
    Key(String),
}

impl FieldValue {
    /// Kind name, matching [`RoleKind::name`].
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Category(_) => "categorical",
            FieldValue::Numeric(_) => "numeric",
            FieldValue::Key(_) => "text-key",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Category(s) | FieldValue::Key(s) => f.write_str(s),
            FieldValue::Numeric(v) => write!(f, "{v}"),
        }
    }
}

/// An input structured by roles.
///
/// # Example
///
/// ```rust
/// use glyph_churn::{FieldValue, Record};
///
/// let record = Record::new()
///     .with_key("customer_id", "acme-corp")
///     .with_numeric("logins", 0.0)
///     .with_category("usage_band", "inactive");
/// assert_eq!(record.len(), 3);
/// assert_eq!(record.get("logins"), Some(&FieldValue::Numeric(0.0)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a categorical field.
    #[must_use]
    pub fn with_category(mut self, role: impl Into<String>, label: impl Into<String>) -> Self {
        self.insert(role, FieldValue::Category(label.into()));
        self
    }

    /// Add a numeric field.
    #[must_use]
    pub fn with_numeric(mut self, role: impl Into<String>, value: f64) -> Self {
        self.insert(role, FieldValue::Numeric(value));
        self
    }

    /// Add the key field.
    #[must_use]
    pub fn with_key(mut self, role: impl Into<String>, key: impl Into<String>) -> Self {
        self.insert(role, FieldValue::Key(key.into()));
        self
    }

    /// Set a field, returning the previous value.
    pub fn insert(&mut self, role: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(role.into(), value)
    }

    /// Remove a field.
    pub fn remove(&mut self, role: &str) -> Option<FieldValue> {
        self.fields.remove(role)
    }

    /// Get a field.
    #[must_use]
    pub fn get(&self, role: &str) -> Option<&FieldValue> {
        self.fields.get(role)
    }

    /// Check for a field.
    #[must_use]
    pub fn contains(&self, role: &str) -> bool {
        self.fields.contains_key(role)
    }

    /// Fields in role-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Value of the role set's text-key role, if present.
    #[must_use]
    pub fn key<'a>(&'a self, roles: &RoleSet) -> Option<&'a str> {
        let role = roles.key_role()?;
        match self.fields.get(&role.name) {
            Some(FieldValue::Key(k)) => Some(k),
            _ => None,
        }
    }

    /// Validate a raw JSON object against a role set.
    ///
    /// Nulls and empty strings count as absent. Fields that name no role are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the input is not an object or a field has
    /// the wrong JSON type for its role.
    ///
    /// # Example
    ///
    /// ```rust
    /// use glyph_churn::{FieldValue, ModelConfig, Record};
    /// use serde_json::json;
    ///
    /// # fn main() -> glyph_churn::Result<()> {
    /// let roles = ModelConfig::churn().role_set()?;
    /// let raw = json!({
    ///     "customer_id": "beta-inc",
    ///     "support_cases": 15,
    ///     "risk_level": "",
    ///     "note": "x",
    /// });
    /// let record = Record::from_json(&roles, &raw)?;
    /// assert_eq!(record.len(), 2);
    /// assert_eq!(record.get("support_cases"), Some(&FieldValue::Numeric(15.0)));
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_json(roles: &RoleSet, raw: &Value) -> Result<Self> {
        let Value::Object(map) = raw else {
            return Err(GlyphError::TypeMismatch {
                role: "<record>".into(),
                expected: "object",
                found: json_type(raw).into(),
            });
        };

        let mut record = Self::new();
        for (name, value) in map {
            let Some(role) = roles.get(name) else {
                debug!(field = %name, "ignoring field with no matching role");
                continue;
            };
            if is_absent(value) {
                continue;
            }

            let mismatch = |expected: &'static str| GlyphError::TypeMismatch {
                role: name.clone(),
                expected,
                found: json_type(value).into(),
            };

            let field = match (&role.kind, value) {
                (RoleKind::Categorical { .. }, Value::String(s)) => FieldValue::Category(s.clone()),
                (RoleKind::Categorical { .. }, _) => return Err(mismatch("string")),
                (RoleKind::Numeric(_), Value::Number(n)) => {
                    FieldValue::Numeric(n.as_f64().ok_or_else(|| mismatch("number"))?)
                }
                (RoleKind::Numeric(_), _) => return Err(mismatch("number")),
                (RoleKind::TextKey, Value::String(s)) => FieldValue::Key(s.clone()),
                (RoleKind::TextKey, _) => return Err(mismatch("string")),
            };
            record.insert(name.clone(), field);
        }
        Ok(record)
    }
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A label field of a training pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelField {
    /// Churn risk.
    RiskLevel,
    /// Primary churn driver.
    ChurnDriver,
    /// Usage trend band.
    UsageBand,
}

impl LabelField {
    /// All label fields, in verdict order.
    pub const ALL: [LabelField; 3] = [
        LabelField::RiskLevel,
        LabelField::ChurnDriver,
        LabelField::UsageBand,
    ];

    /// Field name, also the name of the matching categorical role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LabelField::RiskLevel => "risk_level",
            LabelField::ChurnDriver => "churn_driver",
            LabelField::UsageBand => "usage_band",
        }
    }
}

impl fmt::Display for LabelField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome labels of a training pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    /// Churn risk.
    pub risk_level: String,
    /// Primary churn driver.
    pub churn_driver: String,
    /// Usage trend band.
    pub usage_band: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            risk_level: "medium".into(),
            churn_driver: "low_usage".into(),
            usage_band: "stable".into(),
        }
    }
}

impl Labels {
    /// Create labels.
    pub fn new(
        risk_level: impl Into<String>,
        churn_driver: impl Into<String>,
        usage_band: impl Into<String>,
    ) -> Self {
        Self {
            risk_level: risk_level.into(),
            churn_driver: churn_driver.into(),
            usage_band: usage_band.into(),
        }
    }

    /// Value of one field.
    #[must_use]
    pub fn get(&self, field: LabelField) -> &str {
        match field {
            LabelField::RiskLevel => &self.risk_level,
            LabelField::ChurnDriver => &self.churn_driver,
            LabelField::UsageBand => &self.usage_band,
        }
    }

    /// Check every label against the categorical role of the same name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCategory` for a label outside its role's enumeration.
    pub fn validate(&self, roles: &RoleSet) -> Result<()> {
        for field in LabelField::ALL {
            let value = self.get(field);
            if let Some(values) = roles.get(field.as_str()).and_then(|r| r.categories()) {
                if !values.iter().any(|v| v == value) {
                    return Err(GlyphError::UnknownCategory {
                        role: field.as_str().into(),
                        value: value.into(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Metadata carried alongside a training pattern. Never encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternAnnotation {
    /// Pattern name.
    pub name: String,
    /// Outcome labels.
    pub labels: Labels,
    /// Search keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Canned response text.
    #[serde(default)]
    pub response: String,
    /// Recommended action.
    #[serde(default)]
    pub recommended_action: String,
}

/// One labeled training example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingEntry {
    /// Encodable fields.
    pub record: Record,
    /// Labels and metadata.
    pub annotation: PatternAnnotation,
}

impl TrainingEntry {
    /// Create an entry.
    #[must_use]
    pub fn new(record: Record, annotation: PatternAnnotation) -> Self {
        Self { record, annotation }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use serde_json::json;

    fn roles() -> RoleSet {
        ModelConfig::churn().role_set().unwrap()
    }

    #[test]
    fn test_from_json_types() {
        let raw = json!({
            "customer_id": "acme-corp",
            "risk_level": "high",
            "logins": 12,
            "feature_adoption": 33.5,
            "unrelated": [1, 2, 3]
        });
        let record = Record::from_json(&roles(), &raw).unwrap();
        assert_eq!(record.len(), 4);
        assert_eq!(record.key(&roles()), Some("acme-corp"));
        assert_eq!(record.get("risk_level"), Some(&FieldValue::Category("high".into())));
        assert_eq!(record.get("feature_adoption"), Some(&FieldValue::Numeric(33.5)));
        assert!(!record.contains("unrelated"));
    }

    #[test]
    fn test_from_json_absent_values() {
        let raw = json!({"customer_id": "", "churn_driver": null, "logins": 1});
        let record = Record::from_json(&roles(), &raw).unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record.key(&roles()), None);
    }

    #[test]
    fn test_from_json_type_mismatch() {
        let err = Record::from_json(&roles(), &json!({"logins": "many"})).unwrap_err();
        assert!(matches!(
            err,
            GlyphError::TypeMismatch { ref role, expected: "number", .. } if role == "logins"
        ));

        let err = Record::from_json(&roles(), &json!({"risk_level": 3})).unwrap_err();
        assert!(matches!(err, GlyphError::TypeMismatch { expected: "string", .. }));

        let err = Record::from_json(&roles(), &json!([1, 2])).unwrap_err();
        assert!(matches!(err, GlyphError::TypeMismatch { expected: "object", .. }));
    }

    #[test]
    fn test_labels_validate() {
        assert!(Labels::new("high", "support_burden", "declining")
            .validate(&roles())
            .is_ok());
        let err = Labels::new("extreme", "support_burden", "declining")
            .validate(&roles())
            .unwrap_err();
        assert!(matches!(err, GlyphError::UnknownCategory { ref role, .. } if role == "risk_level"));
    }

    #[test]
    fn test_record_serde_shape() {
        let record = Record::new().with_numeric("logins", 5.0);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"logins": {"kind": "numeric", "value": 5.0}}));
        let back: Record = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
