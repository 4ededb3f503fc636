//! Item map
//!
//! Records, per local item, the reference it resolved to and the remote pk
//! (absent when the remote catalog has no entry yet). The map outlives the
//! run: it is persisted and handed back to the caller.

use crate::guid::ExternalRef;
use crate::table::Pk;
use core_library::{LocalId, SectionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMapEntry {
    pub section: SectionId,
    pub key: ExternalRef,
    pub pk: Option<Pk>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMap {
    entries: BTreeMap<LocalId, ItemMapEntry>,
}

impl ItemMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the attempted mapping for `item`, replacing any earlier one.
    pub fn add(&mut self, section: SectionId, item: LocalId, key: ExternalRef, pk: Option<Pk>) {
        self.entries.insert(item, ItemMapEntry { section, key, pk });
    }

    pub fn get(&self, item: LocalId) -> Option<&ItemMapEntry> {
        self.entries.get(&item)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LocalId, &ItemMapEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose remote pk is known.
    pub fn matched(&self) -> usize {
        self.entries.values().filter(|entry| entry.pk.is_some()).count()
    }
}

impl FromIterator<(LocalId, ItemMapEntry)> for ItemMap {
    fn from_iter<I: IntoIterator<Item = (LocalId, ItemMapEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
