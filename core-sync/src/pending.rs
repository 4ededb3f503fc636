//! Pending tracker
//!
//! Before the episode pass every remote unit is seeded as unresolved. The
//! pass flips the units it matches; whatever is still unresolved at the end
//! is present remotely but was not observed locally.

use crate::media::SyncData;
use crate::table::Pk;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// `(pk, season, episode)` join key between remote and local units
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PendingKey {
    pub pk: Pk,
    pub season: u32,
    pub episode: u32,
}

impl PendingKey {
    pub fn new(pk: Pk, season: u32, episode: u32) -> Self {
        Self { pk, season, episode }
    }
}

impl fmt::Display for PendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.pk, self.season, self.episode)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PendingTracker {
    units: HashMap<SyncData, HashMap<PendingKey, bool>>,
}

impl PendingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `keys` as unresolved for `data`. Already resolved units stay resolved.
    pub fn seed(&mut self, data: SyncData, keys: impl IntoIterator<Item = PendingKey>) {
        let units = self.units.entry(data).or_default();
        for key in keys {
            units.entry(key).or_insert(false);
        }
    }

    /// Flip `key` to resolved. Returns `true` only on the first flip.
    ///
    /// A key that was never seeded is inserted as resolved.
    pub fn mark_resolved(&mut self, data: SyncData, key: PendingKey) -> bool {
        let resolved = self.units.entry(data).or_default().entry(key).or_insert(false);
        if *resolved {
            return false;
        }
        *resolved = true;
        true
    }

    pub fn is_resolved(&self, data: SyncData, key: &PendingKey) -> Option<bool> {
        self.units.get(&data).and_then(|units| units.get(key)).copied()
    }

    /// Units of `data` still unresolved.
    pub fn remaining(&self, data: SyncData) -> usize {
        self.units
            .get(&data)
            .map(|units| units.values().filter(|resolved| !**resolved).count())
            .unwrap_or(0)
    }

    /// Unresolved count for every tracked data type.
    pub fn remaining_by_type(&self) -> BTreeMap<SyncData, usize> {
        self.units
            .keys()
            .map(|data| (*data, self.remaining(*data)))
            .collect()
    }

    pub fn data_types(&self) -> impl Iterator<Item = SyncData> + '_ {
        self.units.keys().copied()
    }

    /// Ordered copy of the full state, data type → unit → resolved.
    pub fn snapshot(&self) -> BTreeMap<SyncData, BTreeMap<PendingKey, bool>> {
        self.units
            .iter()
            .map(|(data, units)| {
                let units = units
                    .iter()
                    .map(|(key, resolved)| (key.clone(), *resolved))
                    .collect();
                (*data, units)
            })
            .collect()
    }
}
