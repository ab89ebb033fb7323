//! JSONL training data.
//!
//! One pattern per line:
//!
//! ```text
//! {"question": "...", "customer_id": "...", "risk_level": "high",
//!  "churn_driver": "low_usage", "usage_band": "inactive",
//!  "keywords": ["inactive", "zero logins"], "logins": 0, "support_cases": 0,
//!  "defects": 0, "feature_adoption": 0, "response": "...",
//!  "recommended_action": "..."}
//! ```
//!
//! Fields naming a role become the record; label fields are lifted into the
//! annotation and never land in the record.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{GlyphError, Result};
use crate::record::{FieldValue, LabelField, Labels, PatternAnnotation, Record, TrainingEntry};
use crate::role::RoleSet;

const NAME_LIMIT: usize = 40;

#[derive(Deserialize)]
#[serde(untagged)]
enum Keywords {
    List(Vec<String>),
    Text(String),
}

impl Default for Keywords {
    fn default() -> Self {
        Keywords::List(Vec::new())
    }
}

impl Keywords {
    fn into_vec(self) -> Vec<String> {
        match self {
            Keywords::List(list) => list,
            Keywords::Text(text) => text.split_whitespace().map(str::to_string).collect(),
        }
    }
}

/// Metadata side of a pattern line.
#[derive(Deserialize)]
struct PatternLine {
    #[serde(default)]
    question: String,
    #[serde(default = "default_risk")]
    risk_level: String,
    #[serde(default = "default_driver")]
    churn_driver: String,
    #[serde(default = "default_band")]
    usage_band: String,
    #[serde(default)]
    keywords: Keywords,
    #[serde(default)]
    response: String,
    #[serde(default)]
    recommended_action: String,
}

fn default_risk() -> String {
    Labels::default().risk_level
}

fn default_driver() -> String {
    Labels::default().churn_driver
}

fn default_band() -> String {
    Labels::default().usage_band
}

/// Pattern name derived from its question: lowercase, non-alphanumeric runs
/// collapsed to `_`, at most 40 characters.
#[must_use]
pub fn slug(question: &str) -> String {
    let mut out = String::with_capacity(question.len());
    for c in question.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').chars().take(NAME_LIMIT).collect()
}

/// Convert one parsed line into a training entry.
///
/// # Errors
///
/// Returns `Dataset` if the line is not an object, and `TypeMismatch` for a
/// role field of the wrong type.
pub fn entry_from_json(roles: &RoleSet, raw: &Value) -> Result<TrainingEntry> {
    if !raw.is_object() {
        return Err(GlyphError::Dataset("pattern line must be a JSON object".into()));
    }

    let line: PatternLine = serde_json::from_value(raw.clone())?;
    let mut record = Record::from_json(roles, raw)?;
    for field in LabelField::ALL {
        record.remove(field.as_str());
    }

    for (name, value) in record.iter() {
        if let (FieldValue::Numeric(v), Some(spec)) =
            (value, roles.get(name).and_then(|r| r.numeric_spec()))
        {
            if !spec.contains(*v) {
                warn!(
                    role = name,
                    value = *v,
                    min = spec.min,
                    max = spec.max,
                    "training value outside role range, clamped when encoded"
                );
            }
        }
    }

    let annotation = PatternAnnotation {
        name: slug(&line.question),
        labels: Labels::new(line.risk_level, line.churn_driver, line.usage_band),
        keywords: line.keywords.into_vec(),
        response: line.response,
        recommended_action: line.recommended_action,
    };
    Ok(TrainingEntry::new(record, annotation))
}

/// Parse JSONL content. Blank lines are skipped.
///
/// # Errors
///
/// Returns `Dataset` naming the first line that fails to parse or convert.
pub fn parse_jsonl(content: &str, roles: &RoleSet) -> Result<Vec<TrainingEntry>> {
    let mut entries = Vec::new();

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let raw: Value = serde_json::from_str(line)
            .map_err(|e| GlyphError::Dataset(format!("line {}: failed to parse: {e}", i + 1)))?;
        let entry = entry_from_json(roles, &raw)
            .map_err(|e| GlyphError::Dataset(format!("line {}: {e}", i + 1)))?;
        entries.push(entry);
    }

    Ok(entries)
}

/// Load a JSONL pattern file.
///
/// # Errors
///
/// Returns `Io` if the file cannot be read, or `Dataset` as
/// [`parse_jsonl`] does.
pub fn load_jsonl<P: AsRef<Path>>(path: P, roles: &RoleSet) -> Result<Vec<TrainingEntry>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let entries = parse_jsonl(&content, roles)?;
    info!(path = %path.display(), entries = entries.len(), "loaded training patterns");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::config::ModelConfig;

    fn roles() -> RoleSet {
        ModelConfig::churn().role_set().unwrap()
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Customer has ZERO logins!"), "customer_has_zero_logins");
        assert_eq!(slug("  --  "), "");
        assert_eq!(slug(&"a b ".repeat(30)).len(), 40);
    }

    #[test]
    fn test_load_valid() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"question": "Inactive account", "risk_level": "high", "churn_driver": "low_usage", "usage_band": "inactive", "keywords": ["inactive", "zero"], "logins": 0, "support_cases": 0, "defects": 0, "feature_adoption": 0, "response": "Reach out", "recommended_action": "call"}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"question": "Defaults only", "keywords": "a b c"}}"#).unwrap();

        let entries = load_jsonl(file.path(), &roles()).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.annotation.name, "inactive_account");
        assert_eq!(first.annotation.labels, Labels::new("high", "low_usage", "inactive"));
        assert_eq!(first.annotation.recommended_action, "call");
        assert_eq!(first.record.len(), 4);
        assert!(!first.record.contains("risk_level"));

        let second = &entries[1];
        assert_eq!(second.annotation.labels, Labels::default());
        assert_eq!(second.annotation.keywords, vec!["a", "b", "c"]);
        assert!(second.record.is_empty());
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let content = "{\"question\": \"ok\"}\n{\"question\": ";
        let err = parse_jsonl(content, &roles()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_wrong_type_reports_position() {
        let content = r#"{"logins": "lots"}"#;
        let err = parse_jsonl(content, &roles()).unwrap_err();
        assert!(matches!(err, GlyphError::Dataset(ref m) if m.contains("line 1") && m.contains("logins")));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            parse_jsonl("[1, 2]", &roles()),
            Err(GlyphError::Dataset(_))
        ));
    }
}
