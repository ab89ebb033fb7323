//! Serialized model artifact.
//!
//! A bundle carries the config and every encoded pattern. Symbols are not
//! stored: they are regenerated from the config, which is why the seed
//! scheme is recorded and checked on load.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use glyph_vsa::SEED_SCHEME;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ModelConfig;
use crate::encoder::Glyph;
use crate::error::{GlyphError, Result};
use crate::library::PatternLibrary;

/// Model identity, config and encoded patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    /// Model identifier.
    pub model_id: String,
    /// Model version.
    pub version: String,
    /// Seed derivation scheme the patterns were encoded with.
    pub seed_scheme: u32,
    /// Model configuration.
    pub config: ModelConfig,
    /// Encoded training patterns in library order.
    pub patterns: Vec<Glyph>,
}

impl ModelBundle {
    /// Bundle a config with its library.
    #[must_use]
    pub fn new(config: ModelConfig, library: &PatternLibrary) -> Self {
        Self {
            model_id: config.model_id.clone(),
            version: config.version.clone(),
            seed_scheme: SEED_SCHEME,
            config,
            patterns: library.all().to_vec(),
        }
    }

    /// Check the bundle against this build.
    ///
    /// # Errors
    ///
    /// Returns `Bundle` for a foreign seed scheme or an identity that
    /// disagrees with the config, `Config` for an invalid config, and
    /// `DimensionMismatch` for a pattern of the wrong size.
    pub fn validate(&self) -> Result<()> {
        if self.seed_scheme != SEED_SCHEME {
            return Err(GlyphError::Bundle(format!(
                "seed scheme {} is not supported (expected {SEED_SCHEME})",
                self.seed_scheme
            )));
        }
        if self.model_id != self.config.model_id || self.version != self.config.version {
            return Err(GlyphError::Bundle(format!(
                "bundle identity {}@{} disagrees with config {}@{}",
                self.model_id, self.version, self.config.model_id, self.config.version
            )));
        }
        self.config.validate()?;
        self.to_library().map(|_| ())
    }

    /// Rebuild the pattern library.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` for a pattern of the wrong size.
    pub fn to_library(&self) -> Result<PatternLibrary> {
        PatternLibrary::from_glyphs(self.config.dimension, self.patterns.clone())
    }

    /// Write the bundle as JSON.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Json` on failure.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        info!(path = %path.display(), patterns = self.patterns.len(), "saved model bundle");
        Ok(())
    }

    /// Read and validate a bundle.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Json` on read failure, plus everything
    /// [`ModelBundle::validate`] returns.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bundle: Self = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        bundle.validate()?;
        info!(
            path = %path.display(),
            model = %bundle.model_id,
            version = %bundle.version,
            patterns = bundle.patterns.len(),
            "loaded model bundle"
        );
        Ok(bundle)
    }
}
