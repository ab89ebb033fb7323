//! Model configuration parsing and validation.

use std::path::Path;

use glyph_vsa::LevelChain;
use serde::{Deserialize, Serialize};

use crate::error::{GlyphError, Result};
use crate::role::{NumericSpec, Role, RoleSet};

/// Parameters of one model version.
///
/// Dimension, seed, flip density and roles fix every symbol the model can
/// produce, so two configs that agree on them encode bit-identically.
///
/// # Example
///
/// ```rust
/// use glyph_churn::ModelConfig;
///
/// # fn main() -> glyph_churn::Result<()> {
/// let config = ModelConfig::from_preset("churn")?.with_dimension(2048).with_seed(7);
/// config.validate()?;
/// assert_eq!(config.roles.len(), 8);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier.
    pub model_id: String,

    /// Model version.
    #[serde(default = "default_version")]
    pub version: String,

    /// Hypervector dimensionality.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Symbol generation seed.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Fraction of `D` flipped per numeric bin step. `None` spreads the
    /// flips so the first and last bin of each role are orthogonal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_flip_density: Option<f64>,

    /// Bind training labels into pattern vectors as categorical roles.
    #[serde(default)]
    pub encode_labels: bool,

    /// Named layers with their scoring weights.
    #[serde(default)]
    pub layers: Vec<LayerConfig>,

    /// Role declarations, in binding order.
    pub roles: Vec<Role>,

    /// Ranking and voting policy.
    #[serde(default)]
    pub ranking: RankingConfig,

    /// Temporal store policy.
    #[serde(default)]
    pub temporal: TemporalConfig,
}

fn default_version() -> String {
    "0.1.0".into()
}

fn default_dimension() -> usize {
    10_000
}

fn default_seed() -> u64 {
    42
}

/// A named group of roles with its own bundled vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Layer name.
    pub name: String,
    /// Weight in layered scoring.
    pub weight: f32,
}

impl LayerConfig {
    /// Create a layer.
    pub fn new(name: impl Into<String>, weight: f32) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

/// How a query glyph is scored against a pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreMode {
    /// Cosine of the full bundled vectors.
    #[default]
    Global,
    /// Layer-weighted mean of per-layer cosines.
    Layered,
}

/// Ranking and voting policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Matches returned when the caller does not choose.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Matches that take part in the label vote.
    #[serde(default = "default_vote_k")]
    pub vote_k: usize,
    /// Scoring mode.
    #[serde(default)]
    pub score_mode: ScoreMode,
}

fn default_top_k() -> usize {
    5
}

fn default_vote_k() -> usize {
    3
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            vote_k: default_vote_k(),
            score_mode: ScoreMode::default(),
        }
    }
}

/// Temporal store policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalConfig {
    /// Give same-instant batch entries a +1 ns tie-break instead of failing.
    #[serde(default)]
    pub allow_same_instant: bool,
    /// Verdicts fed to the forecast trend line.
    #[serde(default = "default_forecast_window")]
    pub forecast_window: usize,
    /// Steps ahead the forecast extrapolates.
    #[serde(default = "default_forecast_horizon")]
    pub forecast_horizon: usize,
}

fn default_forecast_window() -> usize {
    5
}

fn default_forecast_horizon() -> usize {
    1
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            allow_same_instant: false,
            forecast_window: default_forecast_window(),
            forecast_horizon: default_forecast_horizon(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::churn()
    }
}

impl ModelConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read and `Yaml` if it does not parse.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `Yaml` or `Io` on failure.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create a configuration from a preset.
    ///
    /// Available presets:
    /// - `"churn"` - customer churn model
    ///
    /// # Errors
    ///
    /// Returns `Config` for an unknown preset name.
    pub fn from_preset(name: &str) -> Result<Self> {
        match name {
            "churn" => Ok(Self::churn()),
            other => Err(GlyphError::Config(format!("unknown preset: {other}"))),
        }
    }

    /// Customer churn preset.
    ///
    /// One text key, three label roles in the `semantic` layer and four usage
    /// metrics in the `metrics` layer.
    #[must_use]
    pub fn churn() -> Self {
        let roles = vec![
            Role::text_key("customer_id")
                .in_layer("semantic")
                .with_weight(0.1)
                .with_lexicons(["customer", "account", "client", "customer id"]),
            Role::categorical("risk_level", ["high", "medium", "low"])
                .in_layer("semantic")
                .with_weight(0.9)
                .with_lexicons(["risk", "churn risk", "risk level", "health"]),
            Role::categorical(
                "churn_driver",
                [
                    "low_usage",
                    "support_burden",
                    "defect_frustration",
                    "low_adoption",
                    "onboarding_stall",
                    "billing_friction",
                ],
            )
            .in_layer("semantic")
            .with_weight(0.8)
            .with_lexicons(["driver", "reason", "cause", "churn driver"]),
            Role::categorical("usage_band", ["inactive", "declining", "stable", "growing"])
                .in_layer("semantic")
                .with_weight(0.7)
                .with_lexicons(["usage", "activity", "engagement", "trend"]),
            Role::numeric("logins", NumericSpec::new(0.0, 200.0, 10.0).with_default(50.0))
                .in_layer("metrics")
                .with_weight(1.0)
                .required()
                .with_lexicons(["logins", "login count", "sessions", "activity"]),
            Role::numeric(
                "support_cases",
                NumericSpec::new(0.0, 20.0, 1.0).with_default(2.0),
            )
            .in_layer("metrics")
            .with_weight(0.9)
            .required()
            .with_lexicons(["support", "tickets", "cases", "support cases"]),
            Role::numeric("defects", NumericSpec::new(0.0, 15.0, 1.0).with_default(1.0))
                .in_layer("metrics")
                .with_weight(0.9)
                .required()
                .with_lexicons(["defects", "bugs", "errors", "crashes"]),
            Role::numeric(
                "feature_adoption",
                NumericSpec::new(0.0, 100.0, 5.0).with_default(50.0),
            )
            .in_layer("metrics")
            .with_weight(0.8)
            .required()
            .with_lexicons(["adoption", "features", "feature usage", "utilization"]),
        ];

        Self {
            model_id: "customer-churn".into(),
            version: default_version(),
            dimension: default_dimension(),
            seed: default_seed(),
            level_flip_density: None,
            encode_labels: false,
            layers: vec![
                LayerConfig::new("semantic", 0.6),
                LayerConfig::new("metrics", 0.4),
            ],
            roles,
            ranking: RankingConfig::default(),
            temporal: TemporalConfig::default(),
        }
    }

    /// Set the dimension.
    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the level flip density.
    #[must_use]
    pub fn with_level_flip_density(mut self, density: f64) -> Self {
        self.level_flip_density = Some(density);
        self
    }

    /// Toggle label encoding for training patterns.
    #[must_use]
    pub fn with_encode_labels(mut self, encode: bool) -> Self {
        self.encode_labels = encode;
        self
    }

    /// Set the score mode.
    #[must_use]
    pub fn with_score_mode(mut self, mode: ScoreMode) -> Self {
        self.ranking.score_mode = mode;
        self
    }

    /// Set the vote depth.
    #[must_use]
    pub fn with_vote_k(mut self, vote_k: usize) -> Self {
        self.ranking.vote_k = vote_k;
        self
    }

    /// Allow same-instant batch entries.
    #[must_use]
    pub fn with_allow_same_instant(mut self, allow: bool) -> Self {
        self.temporal.allow_same_instant = allow;
        self
    }

    /// Replace the role list.
    #[must_use]
    pub fn with_roles(mut self, roles: Vec<Role>) -> Self {
        self.roles = roles;
        self
    }

    /// Replace the layer list.
    #[must_use]
    pub fn with_layers(mut self, layers: Vec<LayerConfig>) -> Self {
        self.layers = layers;
        self
    }

    /// Positions flipped per bin step for a numeric role.
    #[must_use]
    pub fn flips_per_step(&self, spec: &NumericSpec) -> usize {
        match self.level_flip_density {
            Some(density) => ((density * self.dimension as f64).round() as usize).max(1),
            None => LevelChain::default_flips(self.dimension, spec.num_bins()),
        }
    }

    /// Weight of a layer, if declared.
    #[must_use]
    pub fn layer_weight(&self, name: &str) -> Option<f32> {
        self.layers.iter().find(|l| l.name == name).map(|l| l.weight)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Config` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.role_set().map(|_| ())
    }

    /// Validate and freeze the role declarations.
    ///
    /// # Errors
    ///
    /// Returns `Config` describing the first problem found.
    pub fn role_set(&self) -> Result<RoleSet> {
        if self.model_id.is_empty() {
            return Err(GlyphError::Config("model_id is required".into()));
        }
        if self.dimension == 0 {
            return Err(GlyphError::Config("dimension must be > 0".into()));
        }
        if self.roles.is_empty() {
            return Err(GlyphError::Config("at least one role is required".into()));
        }
        if self.ranking.top_k == 0 {
            return Err(GlyphError::Config("ranking.top_k must be > 0".into()));
        }
        if self.ranking.vote_k == 0 {
            return Err(GlyphError::Config("ranking.vote_k must be > 0".into()));
        }
        if self.temporal.forecast_window < 2 {
            return Err(GlyphError::Config(
                "temporal.forecast_window must be at least 2".into(),
            ));
        }

        for (i, layer) in self.layers.iter().enumerate() {
            if !(layer.weight.is_finite() && layer.weight > 0.0) {
                return Err(GlyphError::Config(format!(
                    "layer {}: weight must be > 0",
                    layer.name
                )));
            }
            if self.layers[..i].iter().any(|l| l.name == layer.name) {
                return Err(GlyphError::Config(format!(
                    "duplicate layer name {:?}",
                    layer.name
                )));
            }
        }

        if let Some(density) = self.level_flip_density {
            if !(density.is_finite() && density > 0.0 && density <= 1.0) {
                return Err(GlyphError::Config(format!(
                    "level_flip_density must lie in (0, 1], got {density}"
                )));
            }
        }

        let roles = RoleSet::new(self.roles.clone())?;
        for role in roles.iter() {
            if let Some(layer) = &role.layer {
                if self.layer_weight(layer).is_none() {
                    return Err(GlyphError::Config(format!(
                        "role {}: undeclared layer {layer:?}",
                        role.name
                    )));
                }
            }
            if let Some(spec) = role.numeric_spec() {
                let total = (spec.num_bins() - 1).saturating_mul(self.flips_per_step(spec));
                if total > self.dimension {
                    return Err(GlyphError::Config(format!(
                        "role {}: {} bins flip {total} positions, more than dimension {}",
                        role.name,
                        spec.num_bins(),
                        self.dimension
                    )));
                }
            }
        }
        Ok(roles)
    }
}
