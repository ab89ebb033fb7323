//! # glyph-churn
//!
//! Hyperdimensional encoding of customer usage records, similarity ranking
//! against a library of labelled patterns, and per-customer snapshot history
//! with trend, drift and forecast analysis.
//!
//! Every record is encoded into a single ternary hypervector (a *glyph*) by
//! binding each role symbol to its value symbol and bundling the results.
//! Numeric roles use a level chain, so nearby values land on nearby vectors.
//! Symbols are derived from `(seed, role, value)` alone: two processes with
//! the same config produce bit-identical glyphs.
//!
//! ## Quick Start
//!
//! ```rust
//! use glyph_churn::{ChurnModel, Labels, ModelConfig, PatternAnnotation, Record, TrainingEntry};
//!
//! # fn main() -> glyph_churn::Result<()> {
//! let annotated = |logins: f64, risk: &str| {
//!     TrainingEntry::new(
//!         Record::new().with_numeric("logins", logins),
//!         PatternAnnotation {
//!             name: risk.into(),
//!             labels: Labels::new(risk, "low_usage", "stable"),
//!             ..PatternAnnotation::default()
//!         },
//!     )
//! };
//! let entries = [annotated(0.0, "high"), annotated(180.0, "low")];
//! let model = ChurnModel::load(ModelConfig::churn().with_dimension(4096), &entries)?;
//!
//! let verdict = model.query(Record::new().with_numeric("logins", 170.0), 2)?;
//! assert_eq!(verdict.risk_level, "low");
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`role`] and [`config`]: role definitions and the model configuration
//! - [`symbols`]: lazily generated, cached role and value symbols
//! - [`encoder`]: record to glyph encoding and role decoding
//! - [`library`] and [`similarity`]: the pattern library and ranking
//! - [`predict`]: label votes, trends and forecasts
//! - [`temporal`] and [`drift`]: snapshot history and drift attribution
//! - [`dataset`] and [`bundle`]: JSONL training data and saved models

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

pub mod bundle;
pub mod config;
pub mod dataset;
pub mod drift;
pub mod encoder;
pub mod error;
pub mod library;
pub mod model;
pub mod predict;
pub mod record;
pub mod role;
pub mod similarity;
pub mod symbols;
pub mod temporal;

pub use bundle::ModelBundle;
pub use config::{LayerConfig, ModelConfig, RankingConfig, ScoreMode, TemporalConfig};
pub use dataset::{load_jsonl, parse_jsonl};
pub use drift::{DriftMode, DriftReport, DriftStep, RoleChange};
pub use encoder::{DecodedRole, Encoder, Glyph};
pub use error::{GlyphError, Result};
pub use library::PatternLibrary;
pub use model::{load_model, ChurnModel, QueryInput};
pub use predict::{forecast, Aggregator, FieldForecast, Forecast, LabelVote, Trend, TrendPoint, Verdict};
pub use record::{FieldValue, LabelField, Labels, PatternAnnotation, Record, TrainingEntry};
pub use role::{NumericSpec, Role, RoleKind, RoleSet};
pub use similarity::{rank, Match, MatchSummary, Scorer};
pub use symbols::{SymbolSpace, SymbolValue};
pub use temporal::{BatchEntry, BatchPolicy, Snapshot, SnapshotStore, TemporalStore};
