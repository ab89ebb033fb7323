//! Error types for glyph-churn.
//!
//! Every failure is reported as a typed [`GlyphError`]. Numeric clamping is
//! encoding policy and never produces an error; domain violations on
//! categorical and key fields always do.
//!
//! # Example - Pattern Matching
//!
//! ```rust
//! use glyph_churn::{ChurnModel, GlyphError, ModelConfig};
//!
//! # fn main() -> glyph_churn::Result<()> {
//! let model = ChurnModel::load(ModelConfig::churn().with_dimension(1024), &[])?;
//! match model.latest("unknown-co") {
//!     Err(GlyphError::UnknownKey(key)) => assert_eq!(key, "unknown-co"),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for glyph-churn operations.
pub type Result<T> = std::result::Result<T, GlyphError>;

/// Errors that can occur in glyph-churn.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GlyphError {
    /// A symbol was requested for a value outside the role's domain.
    #[error("value {value:?} is outside the domain of role {role:?}")]
    OutOfDomain {
        /// Role name.
        role: String,
        /// Offending value, rendered.
        value: String,
    },

    /// A categorical value is not in the role's enumeration.
    #[error("unknown category {value:?} for role {role:?}")]
    UnknownCategory {
        /// Role name.
        role: String,
        /// Offending value.
        value: String,
    },

    /// The record carries no encodable role.
    #[error("record has no encodable roles")]
    EmptyRecord,

    /// A required role is absent.
    #[error("required role {0:?} is missing")]
    MissingRole(String),

    /// `top_k` must be at least 1.
    #[error("invalid top_k {0}: must be at least 1")]
    InvalidTopK(usize),

    /// A snapshot timestamp does not advance past the stored latest.
    #[error("timestamp {timestamp} for key {key:?} is not after the latest snapshot at {latest}")]
    NonMonotonicTimestamp {
        /// Entity key.
        key: String,
        /// Rejected timestamp.
        timestamp: DateTime<Utc>,
        /// Latest stored timestamp for the key.
        latest: DateTime<Utc>,
    },

    /// Two snapshots for one key share an instant within a batch.
    #[error("duplicate snapshot for key {key:?} at {timestamp}")]
    DuplicateSnapshot {
        /// Entity key.
        key: String,
        /// Shared timestamp.
        timestamp: DateTime<Utc>,
    },

    /// No snapshot has been recorded for the key.
    #[error("unknown key {0:?}")]
    UnknownKey(String),

    /// A field names a role the model does not define.
    #[error("unknown role {0:?}")]
    UnknownRole(String),

    /// A field value has the wrong type for its role.
    #[error("role {role:?} expects a {expected} value, found {found}")]
    TypeMismatch {
        /// Role name.
        role: String,
        /// Expected kind.
        expected: &'static str,
        /// What was supplied.
        found: String,
    },

    /// Hypervector dimensions disagree.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Model dimension.
        expected: usize,
        /// Supplied dimension.
        actual: usize,
    },

    /// Too few snapshots for the requested analysis.
    #[error("key {key:?} has {found} snapshot(s), {needed} needed")]
    InsufficientHistory {
        /// Entity key.
        key: String,
        /// Snapshots required.
        needed: usize,
        /// Snapshots available.
        found: usize,
    },

    /// Aggregation was asked to vote over an empty match list.
    #[error("no matches to aggregate")]
    NoMatches,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Model bundle is inconsistent with the running engine.
    #[error("bundle error: {0}")]
    Bundle(String),

    /// Training data error.
    #[error("dataset error: {0}")]
    Dataset(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Hypervector operation error.
    #[error("vector error: {0}")]
    Vsa(#[from] glyph_vsa::VsaError),
}
