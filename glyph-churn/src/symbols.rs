//! Deterministic symbol generation and caching.
//!
//! Every symbol is regenerated from `(model seed, role name, value identity)`
//! on first use and cached for the life of the space. Identities:
//!
//! ```text
//! "@role"         role-identity key
//! "cat:<label>"   categorical value
//! "@level-base"   numeric level chain base vector
//! "@level-perm"   numeric level chain flip order
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use glyph_vsa::random::{derive_seed, permutation, random_bipolar};
use glyph_vsa::{Hypervector, LevelChain};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::{GlyphError, Result};
use crate::record::FieldValue;
use crate::role::{Role, RoleKind, RoleSet};

/// A discrete value a symbol stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolValue {
    /// Categorical label.
    Category(String),
    /// Numeric bin index.
    Bin(usize),
}

impl fmt::Display for SymbolValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolValue::Category(label) => f.write_str(label),
            SymbolValue::Bin(i) => write!(f, "bin {i}"),
        }
    }
}

type CacheKey = (String, SymbolValue);

/// Seeded, cached source of every symbol a model can use.
///
/// Safe to share across threads; lookups take a read lock and generation
/// happens outside any lock.
pub struct SymbolSpace {
    roles: Arc<RoleSet>,
    dimension: usize,
    seed: u64,
    flips: HashMap<String, usize>,
    role_keys: RwLock<HashMap<String, Arc<Hypervector>>>,
    values: RwLock<HashMap<CacheKey, Arc<Hypervector>>>,
    chains: RwLock<HashMap<String, Arc<LevelChain>>>,
}

impl fmt::Debug for SymbolSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolSpace")
            .field("dimension", &self.dimension)
            .field("seed", &self.seed)
            .field("roles", &self.roles.len())
            .field("cached", &self.cached_len())
            .finish()
    }
}

impl SymbolSpace {
    /// Create a space for a configuration.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration is invalid.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let roles = config.role_set()?;
        let flips = roles
            .iter()
            .filter_map(|r| {
                r.numeric_spec()
                    .map(|s| (r.name.clone(), config.flips_per_step(s)))
            })
            .collect();

        Ok(Self {
            roles: Arc::new(roles),
            dimension: config.dimension,
            seed: config.seed,
            flips,
            role_keys: RwLock::new(HashMap::new()),
            values: RwLock::new(HashMap::new()),
            chains: RwLock::new(HashMap::new()),
        })
    }

    /// The frozen role set.
    #[must_use]
    pub fn roles(&self) -> &Arc<RoleSet> {
        &self.roles
    }

    /// Hypervector dimensionality.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Generation seed.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of cached value and role symbols.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.role_keys.read().len() + self.values.read().len()
    }

    /// Symbol for a role and a field value.
    ///
    /// Numeric values are binned here but not clamped: a value outside the
    /// role range is out of domain. Clamping is the encoder's job.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRole`, `OutOfDomain` for a value outside the role's
    /// domain or any value of a text-key role, and `TypeMismatch` when the
    /// value kind does not fit the role.
    pub fn symbol_for(&self, role: &str, value: &FieldValue) -> Result<Arc<Hypervector>> {
        let def = self.roles.require(role)?;
        match (&def.kind, value) {
            (RoleKind::Categorical { .. }, FieldValue::Category(label)) => {
                self.category_symbol(role, label)
            }
            (RoleKind::Numeric(spec), FieldValue::Numeric(v)) => {
                if !spec.contains(*v) {
                    return Err(out_of_domain(role, value));
                }
                self.bin_symbol(role, spec.bin_index(*v))
            }
            (RoleKind::TextKey, _) => Err(out_of_domain(role, value)),
            (kind, _) => Err(GlyphError::TypeMismatch {
                role: role.into(),
                expected: kind.name(),
                found: value.kind_name().into(),
            }),
        }
    }

    /// Role-identity symbol, the binding key of a role.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRole` if the role is not declared.
    pub fn role_symbol(&self, role: &str) -> Result<Arc<Hypervector>> {
        let def = self.roles.require(role)?;
        if let Some(v) = self.role_keys.read().get(&def.name) {
            return Ok(Arc::clone(v));
        }
        let v = Arc::new(random_bipolar(
            self.dimension,
            derive_seed(self.seed, &def.name, "@role"),
        ));
        Ok(Arc::clone(
            self.role_keys.write().entry(def.name.clone()).or_insert(v),
        ))
    }

    /// Symbol of a categorical label.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRole`, `TypeMismatch` for a non-categorical role, or
    /// `OutOfDomain` for a label outside the enumeration.
    pub fn category_symbol(&self, role: &str, label: &str) -> Result<Arc<Hypervector>> {
        let def = self.roles.require(role)?;
        let values = def.categories().ok_or_else(|| mismatch(def, "categorical"))?;
        if !values.iter().any(|v| v == label) {
            return Err(GlyphError::OutOfDomain {
                role: role.into(),
                value: label.into(),
            });
        }
        let key = (def.name.clone(), SymbolValue::Category(label.into()));
        self.cached(key, || {
            Ok(random_bipolar(
                self.dimension,
                derive_seed(self.seed, role, &format!("cat:{label}")),
            ))
        })
    }

    /// Symbol of a numeric bin.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRole`, `TypeMismatch` for a non-numeric role, or
    /// `OutOfDomain` for a bin past the last one.
    pub fn bin_symbol(&self, role: &str, bin: usize) -> Result<Arc<Hypervector>> {
        let def = self.roles.require(role)?;
        let spec = def.numeric_spec().ok_or_else(|| mismatch(def, "numeric"))?;
        if bin >= spec.num_bins() {
            return Err(GlyphError::OutOfDomain {
                role: role.into(),
                value: format!("bin {bin}"),
            });
        }
        let key = (def.name.clone(), SymbolValue::Bin(bin));
        self.cached(key, || Ok(self.chain(def)?.level(bin)?))
    }

    /// Every value symbol of a role, in enumeration or bin order.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRole`, or `OutOfDomain` for a text-key role, which
    /// has no value symbols.
    pub fn candidates(&self, role: &str) -> Result<Vec<(SymbolValue, Arc<Hypervector>)>> {
        let def = self.roles.require(role)?;
        match &def.kind {
            RoleKind::Categorical { values } => values
                .iter()
                .map(|label| -> Result<_> {
                    Ok((
                        SymbolValue::Category(label.clone()),
                        self.category_symbol(role, label)?,
                    ))
                })
                .collect(),
            RoleKind::Numeric(spec) => (0..spec.num_bins())
                .map(|bin| -> Result<_> {
                    Ok((SymbolValue::Bin(bin), self.bin_symbol(role, bin)?))
                })
                .collect(),
            RoleKind::TextKey => Err(GlyphError::OutOfDomain {
                role: role.into(),
                value: "<any>".into(),
            }),
        }
    }

    fn cached<F>(&self, key: CacheKey, generate: F) -> Result<Arc<Hypervector>>
    where
        F: FnOnce() -> Result<Hypervector>,
    {
        if let Some(v) = self.values.read().get(&key) {
            return Ok(Arc::clone(v));
        }
        let v = Arc::new(generate()?);
        Ok(Arc::clone(self.values.write().entry(key).or_insert(v)))
    }

    fn chain(&self, def: &Role) -> Result<Arc<LevelChain>> {
        if let Some(c) = self.chains.read().get(&def.name) {
            return Ok(Arc::clone(c));
        }
        let levels = def.numeric_spec().map_or(1, |s| s.num_bins());
        let flips = self.flips.get(&def.name).copied().unwrap_or(0);
        let base = random_bipolar(
            self.dimension,
            derive_seed(self.seed, &def.name, "@level-base"),
        );
        let order = permutation(
            self.dimension,
            derive_seed(self.seed, &def.name, "@level-perm"),
        );
        let chain = Arc::new(LevelChain::new(base, order, levels, flips)?);
        Ok(Arc::clone(
            self.chains.write().entry(def.name.clone()).or_insert(chain),
        ))
    }
}

fn out_of_domain(role: &str, value: &FieldValue) -> GlyphError {
    GlyphError::OutOfDomain {
        role: role.into(),
        value: value.to_string(),
    }
}

fn mismatch(def: &Role, found: &str) -> GlyphError {
    GlyphError::TypeMismatch {
        role: def.name.clone(),
        expected: def.kind.name(),
        found: found.into(),
    }
}
