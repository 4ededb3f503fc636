//! Key/pk tables
//!
//! Read-only lookups from a canonical reference to the remote catalog's
//! primary key, one table per remote collection.

use crate::guid::ExternalRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Remote catalog primary key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pk(pub String);

impl Pk {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Pk {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Remote collection a key table indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableName {
    Shows,
    Movies,
}

impl TableName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::Shows => "shows",
            TableName::Movies => "movies",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyTable {
    entries: HashMap<ExternalRef, Pk>,
}

impl KeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Several references may point at the same pk (a show known by its
    /// tvdb and imdb ids).
    pub fn insert(&mut self, key: ExternalRef, pk: Pk) -> Option<Pk> {
        self.entries.insert(key, pk)
    }

    pub fn get(&self, key: &ExternalRef) -> Option<&Pk> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(ExternalRef, Pk)> for KeyTable {
    fn from_iter<I: IntoIterator<Item = (ExternalRef, Pk)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
