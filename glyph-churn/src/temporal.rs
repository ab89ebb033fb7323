//! Append-only snapshot history per entity key.
//!
//! Timestamps for a key strictly increase. Stored snapshots are never
//! mutated or removed; a rejected append leaves the history untouched.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::encoder::Glyph;
use crate::error::{GlyphError, Result};

/// One stored snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Snapshot time.
    pub timestamp: DateTime<Utc>,
    /// Position in the key's history, starting at 0.
    pub sequence: u64,
    /// Encoded record, stamped with `timestamp`.
    pub glyph: Arc<Glyph>,
}

/// How a batch treats entries that share a key and an instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPolicy {
    /// Shift each later same-instant entry 1 ns past its predecessor instead
    /// of rejecting the batch.
    pub allow_same_instant: bool,
}

/// One entry of a batch append.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    /// Entity key.
    pub key: String,
    /// Requested timestamp.
    pub timestamp: DateTime<Utc>,
    /// Encoded record.
    pub glyph: Glyph,
}

impl BatchEntry {
    /// Create an entry.
    pub fn new(key: impl Into<String>, timestamp: DateTime<Utc>, glyph: Glyph) -> Self {
        Self {
            key: key.into(),
            timestamp,
            glyph,
        }
    }
}

/// Append-only snapshot storage.
pub trait SnapshotStore: Send + Sync {
    /// Append one snapshot.
    ///
    /// # Errors
    ///
    /// Returns `NonMonotonicTimestamp` unless `timestamp` is after the
    /// latest stored snapshot of `key`.
    fn append(&self, key: &str, timestamp: DateTime<Utc>, glyph: Glyph) -> Result<Snapshot>;

    /// Append a batch. Either every entry is stored or none is.
    ///
    /// Entries are ordered by timestamp within each key before checking.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateSnapshot` for two entries sharing key and instant
    /// unless the policy allows it, and `NonMonotonicTimestamp` for an entry
    /// not after the stored history.
    fn append_batch(&self, entries: Vec<BatchEntry>, policy: BatchPolicy) -> Result<Vec<Snapshot>>;

    /// Snapshots of a key in timestamp order. Empty if the key is unseen.
    fn history(&self, key: &str) -> Vec<Snapshot>;

    /// Latest snapshot of a key.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKey` if the key has no snapshots.
    fn latest(&self, key: &str) -> Result<Snapshot>;

    /// Keys with at least one snapshot, sorted.
    fn keys(&self) -> Vec<String>;

    /// Total number of snapshots.
    fn len(&self) -> usize;

    /// Check if nothing has been stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Slot = Arc<Mutex<Vec<Snapshot>>>;

/// In-memory [`SnapshotStore`].
///
/// Appends to one key serialize on that key's lock; different keys append
/// concurrently.
///
/// # Example
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use glyph_churn::{Glyph, GlyphError, SnapshotStore, TemporalStore};
/// use glyph_vsa::Hypervector;
///
/// let store = TemporalStore::new();
/// let t1 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
/// let t0 = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
/// let glyph = Glyph::from_vector(Hypervector::zeros(16));
///
/// store.append("acme-corp", t1, glyph.clone()).unwrap();
/// let err = store.append("acme-corp", t0, glyph).unwrap_err();
/// assert!(matches!(err, GlyphError::NonMonotonicTimestamp { .. }));
/// assert_eq!(store.history("acme-corp").len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct TemporalStore {
    slots: RwLock<HashMap<String, Slot>>,
}

impl TemporalStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Slot {
        if let Some(slot) = self.slots.read().get(key) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(key.to_string()).or_default())
    }

    fn existing(&self, key: &str) -> Option<Slot> {
        self.slots.read().get(key).map(Arc::clone)
    }
}

fn push(history: &mut Vec<Snapshot>, timestamp: DateTime<Utc>, glyph: &Glyph) -> Snapshot {
    let snapshot = Snapshot {
        timestamp,
        sequence: history.len() as u64,
        glyph: Arc::new(glyph.at(timestamp)),
    };
    history.push(snapshot.clone());
    snapshot
}

impl SnapshotStore for TemporalStore {
    fn append(&self, key: &str, timestamp: DateTime<Utc>, glyph: Glyph) -> Result<Snapshot> {
        let slot = self.slot(key);
        let mut history = slot.lock();

        if let Some(last) = history.last() {
            if timestamp <= last.timestamp {
                warn!(key, %timestamp, latest = %last.timestamp, "rejected non-monotonic snapshot");
                return Err(GlyphError::NonMonotonicTimestamp {
                    key: key.into(),
                    timestamp,
                    latest: last.timestamp,
                });
            }
        }

        let snapshot = push(&mut history, timestamp, &glyph);
        debug!(key, %timestamp, sequence = snapshot.sequence, "appended snapshot");
        Ok(snapshot)
    }

    fn append_batch(&self, entries: Vec<BatchEntry>, policy: BatchPolicy) -> Result<Vec<Snapshot>> {
        // Batch positions grouped per key, in timestamp order.
        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, entry) in entries.iter().enumerate() {
            groups.entry(entry.key.as_str()).or_default().push(i);
        }
        for positions in groups.values_mut() {
            positions.sort_by_key(|&i| entries[i].timestamp);
        }

        // Lock every touched key in sorted order before checking anything.
        let slots: Vec<(&str, Slot)> = groups.keys().map(|&k| (k, self.slot(k))).collect();
        let mut guards: BTreeMap<&str, _> = slots.iter().map(|(k, s)| (*k, s.lock())).collect();

        let mut resolved = vec![None; entries.len()];
        for (&key, positions) in &groups {
            let stored = guards.get(key).and_then(|h| h.last()).map(|s| s.timestamp);
            let mut previous: Option<DateTime<Utc>> = None;

            for &i in positions {
                let mut timestamp = entries[i].timestamp;
                if let Some(prev) = previous {
                    if timestamp <= prev {
                        if !policy.allow_same_instant {
                            warn!(key, %timestamp, "rejected batch with duplicate snapshot");
                            return Err(GlyphError::DuplicateSnapshot {
                                key: key.into(),
                                timestamp,
                            });
                        }
                        timestamp = prev + Duration::nanoseconds(1);
                    }
                }
                if let Some(latest) = stored {
                    if timestamp <= latest {
                        warn!(
                            key,
                            %timestamp,
                            %latest,
                            "rejected batch with non-monotonic snapshot"
                        );
                        return Err(GlyphError::NonMonotonicTimestamp {
                            key: key.into(),
                            timestamp,
                            latest,
                        });
                    }
                }
                resolved[i] = Some(timestamp);
                previous = Some(timestamp);
            }
        }

        let mut appended = vec![None; entries.len()];
        for positions in groups.values() {
            for &i in positions {
                let entry = &entries[i];
                if let (Some(history), Some(timestamp)) =
                    (guards.get_mut(entry.key.as_str()), resolved[i])
                {
                    appended[i] = Some(push(history, timestamp, &entry.glyph));
                }
            }
        }

        debug!(entries = entries.len(), keys = groups.len(), "appended snapshot batch");
        Ok(appended.into_iter().flatten().collect())
    }

    fn history(&self, key: &str) -> Vec<Snapshot> {
        self.existing(key)
            .map(|slot| slot.lock().clone())
            .unwrap_or_default()
    }

    fn latest(&self, key: &str) -> Result<Snapshot> {
        self.existing(key)
            .and_then(|slot| slot.lock().last().cloned())
            .ok_or_else(|| GlyphError::UnknownKey(key.into()))
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .slots
            .read()
            .iter()
            .filter(|(_, slot)| !slot.lock().is_empty())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    fn len(&self) -> usize {
        self.slots.read().values().map(|slot| slot.lock().len()).sum()
    }
}
