//! Media levels and synchronizable data types
//!
//! A run is configured with the set of data types active per media level.
//! The engine only ever iterates the active set, in declaration order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::SyncError;

/// Level of the catalog hierarchy a handler operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMedia {
    Movies,
    Shows,
    Seasons,
    Episodes,
}

impl SyncMedia {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMedia::Movies => "movies",
            SyncMedia::Shows => "shows",
            SyncMedia::Seasons => "seasons",
            SyncMedia::Episodes => "episodes",
        }
    }
}

impl fmt::Display for SyncMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of synchronizable attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncData {
    Collection,
    Playback,
    Ratings,
    Watched,
}

impl SyncData {
    pub const ALL: [SyncData; 4] = [
        SyncData::Collection,
        SyncData::Playback,
        SyncData::Ratings,
        SyncData::Watched,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncData::Collection => "collection",
            SyncData::Playback => "playback",
            SyncData::Ratings => "ratings",
            SyncData::Watched => "watched",
        }
    }
}

impl fmt::Display for SyncData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncData {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collection" => Ok(SyncData::Collection),
            "playback" => Ok(SyncData::Playback),
            "ratings" => Ok(SyncData::Ratings),
            "watched" => Ok(SyncData::Watched),
            other => Err(SyncError::InvalidDataType(other.to_string())),
        }
    }
}

/// Active data types per media level for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSelection {
    active: BTreeMap<SyncMedia, BTreeSet<SyncData>>,
}

impl DataSelection {
    /// Nothing active.
    pub fn none() -> Self {
        Self::default()
    }

    /// Every data type for movies, shows and episodes.
    pub fn all() -> Self {
        let mut selection = Self::none();
        for media in [SyncMedia::Movies, SyncMedia::Shows, SyncMedia::Episodes] {
            for data in SyncData::ALL {
                selection = selection.with(media, data);
            }
        }
        selection
    }

    pub fn with(mut self, media: SyncMedia, data: SyncData) -> Self {
        self.active.entry(media).or_default().insert(data);
        self
    }

    pub fn without(mut self, media: SyncMedia, data: SyncData) -> Self {
        if let Some(set) = self.active.get_mut(&media) {
            set.remove(&data);
        }
        self
    }

    /// Active data types for `media`, in declaration order.
    pub fn get(&self, media: SyncMedia) -> Vec<SyncData> {
        self.active
            .get(&media)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_active(&self, media: SyncMedia, data: SyncData) -> bool {
        self.active
            .get(&media)
            .map(|set| set.contains(&data))
            .unwrap_or(false)
    }

    pub fn has_any(&self, media: SyncMedia) -> bool {
        self.active.get(&media).map(|set| !set.is_empty()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_order_is_stable() {
        let selection = DataSelection::none()
            .with(SyncMedia::Episodes, SyncData::Watched)
            .with(SyncMedia::Episodes, SyncData::Collection)
            .with(SyncMedia::Episodes, SyncData::Ratings);

        assert_eq!(
            selection.get(SyncMedia::Episodes),
            vec![SyncData::Collection, SyncData::Ratings, SyncData::Watched]
        );
        assert!(selection.get(SyncMedia::Shows).is_empty());
    }

    #[test]
    fn test_selection_all_skips_seasons() {
        let selection = DataSelection::all();
        assert_eq!(selection.get(SyncMedia::Shows).len(), 4);
        assert!(!selection.has_any(SyncMedia::Seasons));
    }

    #[test]
    fn test_selection_without() {
        let selection = DataSelection::all().without(SyncMedia::Movies, SyncData::Playback);
        assert!(!selection.is_active(SyncMedia::Movies, SyncData::Playback));
        assert!(selection.is_active(SyncMedia::Movies, SyncData::Watched));
    }

    #[test]
    fn test_data_from_str() {
        assert_eq!("ratings".parse::<SyncData>().unwrap(), SyncData::Ratings);
        assert!("lists".parse::<SyncData>().is_err());
        assert_eq!(SyncMedia::Episodes.to_string(), "episodes");
    }
}
