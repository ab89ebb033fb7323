//! The model handle.
//!
//! A [`ChurnModel`] owns one model version: its symbol space, encoder,
//! pattern library and snapshot store. There is no global state; two handles
//! built from the same config and training data answer identically.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use glyph_vsa::Hypervector;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info};

use crate::bundle::ModelBundle;
use crate::config::ModelConfig;
use crate::drift::{self, DriftMode, DriftReport};
use crate::encoder::{Encoder, Glyph};
use crate::error::{GlyphError, Result};
use crate::library::PatternLibrary;
use crate::predict::{self, Aggregator, Forecast, Trend, TrendPoint, Verdict};
use crate::record::{Record, TrainingEntry};
use crate::similarity::{Match, Scorer};
use crate::symbols::SymbolSpace;
use crate::temporal::{BatchEntry, BatchPolicy, Snapshot, SnapshotStore, TemporalStore};

/// Input accepted by [`ChurnModel::query`].
#[derive(Debug, Clone)]
pub enum QueryInput {
    /// A typed record.
    Record(Record),
    /// A raw JSON object, validated against the role set.
    Raw(Value),
    /// An already encoded vector.
    Vector(Hypervector),
}

impl From<Record> for QueryInput {
    fn from(record: Record) -> Self {
        QueryInput::Record(record)
    }
}

impl From<Value> for QueryInput {
    fn from(raw: Value) -> Self {
        QueryInput::Raw(raw)
    }
}

impl From<Hypervector> for QueryInput {
    fn from(vector: Hypervector) -> Self {
        QueryInput::Vector(vector)
    }
}

/// Build the symbol space and pattern library for a model version.
///
/// # Errors
///
/// Returns `Config` for an invalid config and the first encoding error in
/// entry order.
pub fn load_model(
    config: &ModelConfig,
    entries: &[TrainingEntry],
) -> Result<(Arc<SymbolSpace>, PatternLibrary)> {
    let symbols = Arc::new(SymbolSpace::new(config)?);
    let encoder = Encoder::new(Arc::clone(&symbols)).with_encode_labels(config.encode_labels);
    let library = PatternLibrary::build(&encoder, entries)?;
    Ok((symbols, library))
}

/// One loaded model version.
///
/// # Example
///
/// ```rust
/// use glyph_churn::{ChurnModel, ModelConfig};
/// use serde_json::json;
///
/// # fn main() -> glyph_churn::Result<()> {
/// let model = ChurnModel::load(ModelConfig::churn().with_dimension(2048), &[])?;
/// let snapshot = model.submit_record(&json!({"customer_id": "acme-corp", "logins": 0}))?;
/// assert_eq!(snapshot.sequence, 0);
/// assert_eq!(model.history("acme-corp").len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct ChurnModel {
    config: ModelConfig,
    encoder: Encoder,
    library: PatternLibrary,
    scorer: Scorer,
    aggregator: Aggregator,
    store: Arc<dyn SnapshotStore>,
}

impl std::fmt::Debug for ChurnModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChurnModel")
            .field("model_id", &self.config.model_id)
            .field("version", &self.config.version)
            .field("dimension", &self.config.dimension)
            .field("patterns", &self.library.len())
            .field("snapshots", &self.store.len())
            .finish()
    }
}

impl ChurnModel {
    /// Build a model from config and training entries.
    ///
    /// # Errors
    ///
    /// Same as [`load_model`].
    pub fn load(config: ModelConfig, entries: &[TrainingEntry]) -> Result<Self> {
        let (symbols, library) = load_model(&config, entries)?;
        let model = Self::assemble(config, symbols, library);
        info!(
            model = %model.config.model_id,
            version = %model.config.version,
            patterns = model.library.len(),
            "loaded model"
        );
        Ok(model)
    }

    /// Restore a model from a bundle without the training data.
    ///
    /// # Errors
    ///
    /// Returns what [`ModelBundle::validate`] returns.
    pub fn from_bundle(bundle: ModelBundle) -> Result<Self> {
        bundle.validate()?;
        let library = bundle.to_library()?;
        let symbols = Arc::new(SymbolSpace::new(&bundle.config)?);
        let model = Self::assemble(bundle.config, symbols, library);
        info!(
            model = %model.config.model_id,
            version = %model.config.version,
            patterns = model.library.len(),
            "restored model from bundle"
        );
        Ok(model)
    }

    fn assemble(config: ModelConfig, symbols: Arc<SymbolSpace>, library: PatternLibrary) -> Self {
        Self {
            encoder: Encoder::new(symbols).with_encode_labels(config.encode_labels),
            scorer: Scorer::new(config.ranking.score_mode, config.layers.clone()),
            aggregator: Aggregator::new(config.ranking.vote_k),
            store: Arc::new(TemporalStore::new()),
            library,
            config,
        }
    }

    /// Replace the snapshot store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = store;
        self
    }

    /// Bundle the config and library.
    #[must_use]
    pub fn to_bundle(&self) -> ModelBundle {
        ModelBundle::new(self.config.clone(), &self.library)
    }

    /// Model configuration.
    #[must_use]
    pub const fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// The encoder.
    #[must_use]
    pub const fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    /// The symbol space.
    #[must_use]
    pub fn symbols(&self) -> &Arc<SymbolSpace> {
        self.encoder.symbols()
    }

    /// The pattern library.
    #[must_use]
    pub const fn library(&self) -> &PatternLibrary {
        &self.library
    }

    /// The snapshot store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Encode a raw record and store it as a snapshot taken now.
    ///
    /// # Errors
    ///
    /// Same as [`ChurnModel::submit_record_at`].
    pub fn submit_record(&self, raw: &Value) -> Result<Snapshot> {
        self.submit_record_at(raw, Utc::now())
    }

    /// Encode a raw record and store it as a snapshot at `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns `MissingRole` without a key, any validation or encoding
    /// error, and `NonMonotonicTimestamp` from the store.
    pub fn submit_record_at(&self, raw: &Value, timestamp: DateTime<Utc>) -> Result<Snapshot> {
        let record = Record::from_json(self.encoder.roles(), raw)?;
        self.submit(&record, timestamp)
    }

    /// Encode a typed record and store it as a snapshot at `timestamp`.
    ///
    /// # Errors
    ///
    /// Same as [`ChurnModel::submit_record_at`].
    pub fn submit(&self, record: &Record, timestamp: DateTime<Utc>) -> Result<Snapshot> {
        let key = self.require_key(record)?;
        let glyph = self.encoder.encode_at(record, timestamp)?;
        self.store.append(&key, timestamp, glyph)
    }

    /// Encode and store many records at once. Either all are stored or none.
    ///
    /// Same-instant entries for one key follow
    /// `temporal.allow_same_instant`.
    ///
    /// # Errors
    ///
    /// Returns the first validation or encoding error, or the store's batch
    /// error.
    pub fn submit_batch(&self, records: &[(Record, DateTime<Utc>)]) -> Result<Vec<Snapshot>> {
        let entries = records
            .par_iter()
            .map(|(record, timestamp)| -> Result<BatchEntry> {
                let key = self.require_key(record)?;
                let glyph = self.encoder.encode_at(record, *timestamp)?;
                Ok(BatchEntry::new(key, *timestamp, glyph))
            })
            .collect::<Result<Vec<_>>>()?;

        let policy = BatchPolicy {
            allow_same_instant: self.config.temporal.allow_same_instant,
        };
        self.store.append_batch(entries, policy)
    }

    fn require_key(&self, record: &Record) -> Result<String> {
        let roles = self.encoder.roles();
        let role = roles
            .key_role()
            .ok_or_else(|| GlyphError::Config("model declares no text-key role".into()))?;
        record
            .key(roles)
            .map(str::to_string)
            .ok_or_else(|| GlyphError::MissingRole(role.name.clone()))
    }

    fn query_glyph(&self, input: QueryInput) -> Result<Glyph> {
        match input {
            QueryInput::Record(record) => self.encoder.encode(&record),
            QueryInput::Raw(raw) => {
                let record = Record::from_json(self.encoder.roles(), &raw)?;
                self.encoder.encode(&record)
            }
            QueryInput::Vector(vector) => Ok(Glyph::from_vector(vector)),
        }
    }

    /// Rank an input against the library.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTopK`, `DimensionMismatch`, or any validation or
    /// encoding error.
    pub fn rank(&self, input: impl Into<QueryInput>, top_k: usize) -> Result<Vec<Match<'_>>> {
        let glyph = self.query_glyph(input.into())?;
        self.scorer.rank(&glyph, &self.library, top_k)
    }

    /// Predict labels for an input. Never touches the store.
    ///
    /// # Errors
    ///
    /// Everything [`ChurnModel::rank`] returns, and `NoMatches` when the
    /// library is empty.
    pub fn query(&self, input: impl Into<QueryInput>, top_k: usize) -> Result<Verdict> {
        let matches = self.rank(input, top_k)?;
        self.aggregator.predict(&matches)
    }

    /// Stored snapshots of a key, oldest first.
    #[must_use]
    pub fn history(&self, key: &str) -> Vec<Snapshot> {
        self.store.history(key)
    }

    /// Latest snapshot of a key.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKey` if the key has no snapshots.
    pub fn latest(&self, key: &str) -> Result<Snapshot> {
        self.store.latest(key)
    }

    fn known_history(&self, key: &str) -> Result<Vec<Snapshot>> {
        let history = self.store.history(key);
        if history.is_empty() {
            return Err(GlyphError::UnknownKey(key.into()));
        }
        Ok(history)
    }

    /// Verdict for every stored snapshot of a key.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKey` for an unseen key and `NoMatches` when the
    /// library is empty.
    pub fn trend(&self, key: &str) -> Result<Trend> {
        let history = self.known_history(key)?;
        let points = history
            .iter()
            .map(|snapshot| -> Result<TrendPoint> {
                let matches =
                    self.scorer
                        .rank(&snapshot.glyph, &self.library, self.config.ranking.top_k)?;
                Ok(TrendPoint {
                    timestamp: snapshot.timestamp,
                    verdict: self.aggregator.predict(&matches)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(key, points = points.len(), "computed trend");
        Ok(Trend {
            key: key.into(),
            points,
        })
    }

    /// Drift between a key's snapshots.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKey` for an unseen key and `InsufficientHistory` for a
    /// single snapshot.
    pub fn drift(&self, key: &str, mode: DriftMode) -> Result<DriftReport> {
        let history = self.known_history(key)?;
        drift::drift(&self.encoder, key, &history, mode)
    }

    /// Project the next verdict of a key from its trend.
    ///
    /// # Errors
    ///
    /// Same as [`ChurnModel::trend`].
    pub fn forecast(&self, key: &str) -> Result<Forecast> {
        let trend = self.trend(key)?;
        predict::forecast(
            &trend,
            self.config.temporal.forecast_window,
            self.config.temporal.forecast_horizon,
        )
    }
}
