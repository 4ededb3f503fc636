//! Episode numbering mappings
//!
//! Some services number episodes differently from the remote catalog
//! (absolute numbering, split cours, specials folded into regular seasons).
//! A [`SeriesMapping`] translates a source reference and its local
//! numbering into the reference and numbering the remote catalog uses.
//!
//! Mappings are loaded from JSON:
//!
//! ```json
//! {
//!   "mappings": [
//!     {
//!       "source": "anidb:23",
//!       "target": "tvdb:76885",
//!       "default_season": 1,
//!       "episode_offset": 0,
//!       "overrides": [
//!         { "from": { "season": 1, "episode": 26 },
//!           "to": [{ "season": 0, "episode": 1 }] }
//!       ]
//!     }
//!   ]
//! }
//! ```

use crate::error::{Result, SyncError};
use crate::guid::ExternalRef;
use core_library::EpisodeNumber;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Explicit translation of one local episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeOverride {
    pub from: EpisodeNumber,
    /// Remote pairs in resolution order; empty means "no remote episode"
    pub to: Vec<EpisodeNumber>,
}

/// Translation of one source series into the remote catalog's numbering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesMapping {
    pub source: ExternalRef,
    pub target: ExternalRef,
    /// Season every non-overridden episode lands in; `None` keeps the local season
    #[serde(default)]
    pub default_season: Option<u32>,
    /// Added to the local episode number
    #[serde(default)]
    pub episode_offset: i64,
    #[serde(default)]
    pub overrides: Vec<EpisodeOverride>,
}

impl SeriesMapping {
    /// Remote pairs for the local `number`, in resolution order.
    pub fn translate(&self, number: EpisodeNumber) -> Vec<EpisodeNumber> {
        if let Some(entry) = self.overrides.iter().find(|o| o.from == number) {
            return entry.to.clone();
        }

        let Some(episode) = i64::from(number.episode).checked_add(self.episode_offset) else {
            return Vec::new();
        };
        if episode < 1 {
            return Vec::new();
        }

        let Ok(episode) = u32::try_from(episode) else {
            return Vec::new();
        };

        let season = self.default_season.unwrap_or(number.season);
        vec![EpisodeNumber::new(season, episode)]
    }

    fn validate(&self) -> Result<()> {
        if self.target.service.requires_mapping() {
            return Err(SyncError::Mapping(format!(
                "Mapping for {} targets {}, which the remote catalog does not index",
                self.source, self.target
            )));
        }

        if self.source == self.target {
            return Err(SyncError::Mapping(format!(
                "Mapping for {} targets itself",
                self.source
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct MappingFile {
    #[serde(default)]
    mappings: Vec<SeriesMapping>,
}

/// Lookup of numbering mappings by source reference
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    by_source: HashMap<ExternalRef, SeriesMapping>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON mapping document.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: MappingFile = serde_json::from_str(json)
            .map_err(|e| SyncError::Mapping(format!("Malformed mapping file: {}", e)))?;

        let mut table = Self::new();
        for mapping in file.mappings {
            table.insert(mapping)?;
        }

        debug!(count = table.len(), "Loaded numbering mappings");
        Ok(table)
    }

    /// Load a JSON mapping document from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            SyncError::Mapping(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let table = Self::from_json(&json)?;
        info!(path = %path.display(), count = table.len(), "Numbering mappings loaded");
        Ok(table)
    }

    pub fn insert(&mut self, mapping: SeriesMapping) -> Result<()> {
        mapping.validate()?;

        if self.by_source.contains_key(&mapping.source) {
            return Err(SyncError::Mapping(format!(
                "Duplicate mapping for {}",
                mapping.source
            )));
        }

        self.by_source.insert(mapping.source.clone(), mapping);
        Ok(())
    }

    pub fn get(&self, source: &ExternalRef) -> Option<&SeriesMapping> {
        self.by_source.get(source)
    }

    /// Target reference and remote numbering for `source`, if a mapping exists.
    ///
    /// Without a hint the episode list is empty.
    pub fn resolve(
        &self,
        source: &ExternalRef,
        hint: Option<EpisodeNumber>,
    ) -> Option<(ExternalRef, Vec<EpisodeNumber>)> {
        let mapping = self.by_source.get(source)?;
        let episodes = hint
            .map(|number| mapping.translate(number))
            .unwrap_or_default();
        Some((mapping.target.clone(), episodes))
    }

    pub fn len(&self) -> usize {
        self.by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::Service;

    const MAPPINGS: &str = r#"{
        "mappings": [
            {
                "source": "anidb:23",
                "target": "tvdb:76885",
                "default_season": 1,
                "overrides": [
                    { "from": { "season": 1, "episode": 26 },
                      "to": [{ "season": 0, "episode": 1 }, { "season": 0, "episode": 2 }] },
                    { "from": { "season": 1, "episode": 27 }, "to": [] }
                ]
            },
            {
                "source": "anidb:4563",
                "target": "tvdb:79824",
                "default_season": 2,
                "episode_offset": -12
            }
        ]
    }"#;

    #[test]
    fn test_from_json() {
        let table = MappingTable::from_json(MAPPINGS).unwrap();
        assert_eq!(table.len(), 2);

        let mapping = table.get(&ExternalRef::new(Service::Anidb, "23")).unwrap();
        assert_eq!(mapping.target, ExternalRef::new(Service::Tvdb, "76885"));
        assert_eq!(mapping.episode_offset, 0);
    }

    #[test]
    fn test_translate_default_season_and_offset() {
        let table = MappingTable::from_json(MAPPINGS).unwrap();
        let source = ExternalRef::new(Service::Anidb, "4563");

        let (target, episodes) = table.resolve(&source, Some(EpisodeNumber::new(1, 13))).unwrap();
        assert_eq!(target, ExternalRef::new(Service::Tvdb, "79824"));
        assert_eq!(episodes, vec![EpisodeNumber::new(2, 1)]);

        let (_, episodes) = table.resolve(&source, Some(EpisodeNumber::new(1, 12))).unwrap();
        assert!(episodes.is_empty());
    }

    #[test]
    fn test_translate_extreme_offsets_yield_no_numbering() {
        let json = r#"{"mappings": [
            {"source": "anidb:1", "target": "tvdb:100", "episode_offset": 9223372036854775807},
            {"source": "anidb:2", "target": "tvdb:200", "episode_offset": -9223372036854775808},
            {"source": "anidb:3", "target": "tvdb:300", "episode_offset": 4294967296}
        ]}"#;
        let table = MappingTable::from_json(json).unwrap();
        let hint = Some(EpisodeNumber::new(1, 5));

        for id in ["1", "2", "3"] {
            let (_, episodes) = table
                .resolve(&ExternalRef::new(Service::Anidb, id), hint)
                .unwrap();
            assert!(episodes.is_empty(), "anidb:{id}");
        }
    }

    #[test]
    fn test_translate_overrides() {
        let table = MappingTable::from_json(MAPPINGS).unwrap();
        let source = ExternalRef::new(Service::Anidb, "23");

        let (_, episodes) = table.resolve(&source, Some(EpisodeNumber::new(1, 26))).unwrap();
        assert_eq!(
            episodes,
            vec![EpisodeNumber::new(0, 1), EpisodeNumber::new(0, 2)]
        );

        let (_, episodes) = table.resolve(&source, Some(EpisodeNumber::new(1, 27))).unwrap();
        assert!(episodes.is_empty());

        let (_, episodes) = table.resolve(&source, None).unwrap();
        assert!(episodes.is_empty());
    }

    #[test]
    fn test_resolve_unknown_source() {
        let table = MappingTable::from_json(MAPPINGS).unwrap();
        assert!(table
            .resolve(&ExternalRef::new(Service::Anidb, "1"), Some(EpisodeNumber::new(1, 1)))
            .is_none());
    }

    #[test]
    fn test_rejects_invalid_documents() {
        assert!(matches!(
            MappingTable::from_json("not json"),
            Err(SyncError::Mapping(_))
        ));

        let duplicate = r#"{"mappings": [
            {"source": "anidb:1", "target": "tvdb:1"},
            {"source": "anidb:1", "target": "tvdb:2"}
        ]}"#;
        assert!(MappingTable::from_json(duplicate).is_err());

        let unindexed_target = r#"{"mappings": [{"source": "anidb:1", "target": "anidb:2"}]}"#;
        assert!(MappingTable::from_json(unindexed_target).is_err());

        let bad_ref = r#"{"mappings": [{"source": "anidb:x", "target": "tvdb:2"}]}"#;
        assert!(MappingTable::from_json(bad_ref).is_err());
    }

    #[test]
    fn test_empty_document() {
        let table = MappingTable::from_json("{}").unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let result = MappingTable::load("/nonexistent/mappings.json").await;
        assert!(matches!(result, Err(SyncError::Mapping(_))));
    }
}
