//! Snapshot drift and per-role attribution.
//!
//! Cosine is preserved under binding with a dense key, so comparing unbound
//! probes directly would report the same change for every role. Each probe
//! is cleaned up to its nearest value symbol instead, and a role's change is
//! how far each snapshot's probe moves away from the value decoded on the
//! other side. Roles whose value is untouched only pick up bundling noise,
//! which stays well below a one-bin move of any bound role.

use chrono::{DateTime, Utc};
use glyph_vsa::vsa::cosine_similarity;
use glyph_vsa::Hypervector;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::encoder::{DecodedRole, Encoder, Glyph};
use crate::error::{GlyphError, Result};
use crate::symbols::SymbolValue;
use crate::temporal::Snapshot;

/// Changes below this are treated as no change.
const CHANGE_EPSILON: f32 = 1e-6;

/// Which snapshot pairs to compare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftMode {
    /// First against latest.
    #[default]
    FirstToLatest,
    /// Every consecutive pair, plus first against latest.
    Consecutive,
}

/// Attribution of drift to one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleChange {
    /// Role name.
    pub role: String,
    /// Drop in each probe's similarity to the other snapshot's decoded
    /// value, averaged over both directions. Zero when both decode to the
    /// same value, `1.0` when the role is bound on one side only.
    pub change: f32,
    /// Decoded value in the earlier snapshot, if bound there.
    pub from: Option<SymbolValue>,
    /// Decoded value in the later snapshot, if bound there.
    pub to: Option<SymbolValue>,
}

/// Drift between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftStep {
    /// Earlier snapshot time.
    pub from: DateTime<Utc>,
    /// Later snapshot time.
    pub to: DateTime<Utc>,
    /// `1 - cos` between the two glyph vectors.
    pub magnitude: f32,
    /// Per-role changes, largest first.
    pub role_changes: Vec<RoleChange>,
    /// Every role sharing the largest non-zero change.
    pub most_changed: Vec<String>,
}

/// Drift over a key's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    /// Entity key.
    pub key: String,
    /// Comparison mode.
    pub mode: DriftMode,
    /// First snapshot against latest.
    pub overall: DriftStep,
    /// Consecutive pairs, oldest first. Empty in `FirstToLatest` mode.
    pub steps: Vec<DriftStep>,
}

impl DriftReport {
    /// Overall drift magnitude.
    #[must_use]
    pub fn magnitude(&self) -> f32 {
        self.overall.magnitude
    }

    /// Roles that changed most between first and latest.
    #[must_use]
    pub fn most_changed(&self) -> &[String] {
        &self.overall.most_changed
    }
}

/// Measure drift over a snapshot history.
///
/// # Errors
///
/// Returns `InsufficientHistory` for fewer than two snapshots, plus any
/// decoding error.
pub fn drift(
    encoder: &Encoder,
    key: &str,
    history: &[Snapshot],
    mode: DriftMode,
) -> Result<DriftReport> {
    let (Some(first), Some(last)) = (history.first(), history.last()) else {
        return Err(insufficient(key, history.len()));
    };
    if history.len() < 2 {
        return Err(insufficient(key, history.len()));
    }

    let overall = compare(encoder, first, last)?;
    let steps = match mode {
        DriftMode::FirstToLatest => Vec::new(),
        DriftMode::Consecutive => history
            .windows(2)
            .map(|pair| compare(encoder, &pair[0], &pair[1]))
            .collect::<Result<_>>()?,
    };

    debug!(
        key,
        magnitude = overall.magnitude,
        most_changed = ?overall.most_changed,
        "measured drift"
    );

    Ok(DriftReport {
        key: key.into(),
        mode,
        overall,
        steps,
    })
}

fn insufficient(key: &str, found: usize) -> GlyphError {
    GlyphError::InsufficientHistory {
        key: key.into(),
        needed: 2,
        found,
    }
}

fn compare(encoder: &Encoder, a: &Snapshot, b: &Snapshot) -> Result<DriftStep> {
    let magnitude = 1.0 - cosine_similarity(a.glyph.vector(), b.glyph.vector())?;
    let mut role_changes = attribute(encoder, &a.glyph, &b.glyph)?;
    role_changes.sort_by(|x, y| y.change.total_cmp(&x.change));

    let most_changed = match role_changes.first() {
        Some(top) if top.change > CHANGE_EPSILON => role_changes
            .iter()
            .take_while(|c| (top.change - c.change).abs() <= CHANGE_EPSILON)
            .map(|c| c.role.clone())
            .collect(),
        _ => Vec::new(),
    };

    Ok(DriftStep {
        from: a.timestamp,
        to: b.timestamp,
        magnitude,
        role_changes,
        most_changed,
    })
}

fn attribute(encoder: &Encoder, a: &Glyph, b: &Glyph) -> Result<Vec<RoleChange>> {
    let bound = |g: &Glyph, role: &str| g.roles().iter().any(|r| r == role);

    encoder
        .roles()
        .encoded()
        .filter(|role| bound(a, &role.name) || bound(b, &role.name))
        .map(|role| -> Result<RoleChange> {
            let unbound = |g: &Glyph| -> Result<Option<Hypervector>> {
                if bound(g, &role.name) {
                    encoder.unbind_role(g.vector(), &role.name).map(Some)
                } else {
                    Ok(None)
                }
            };
            let (pa, pb) = (unbound(a)?, unbound(b)?);
            let from = pa.as_ref().map(|p| encoder.cleanup(p, &role.name)).transpose()?;
            let to = pb.as_ref().map(|p| encoder.cleanup(p, &role.name)).transpose()?;

            let change = match (&pa, &pb, &from, &to) {
                (Some(pa), Some(pb), Some(x), Some(y)) => settled_change(pa, pb, x, y)?,
                _ => 1.0,
            };
            Ok(RoleChange {
                role: role.name.clone(),
                change,
                from: from.map(|d| d.value),
                to: to.map(|d| d.value),
            })
        })
        .collect()
}

fn settled_change(
    pa: &Hypervector,
    pb: &Hypervector,
    x: &DecodedRole,
    y: &DecodedRole,
) -> Result<f32> {
    if x.value == y.value {
        return Ok(0.0);
    }
    let lost = x.score - cosine_similarity(pb, &x.symbol)?;
    let gained = y.score - cosine_similarity(pa, &y.symbol)?;
    Ok((0.5 * (lost + gained)).max(0.0))
}
