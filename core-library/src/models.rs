//! Domain models for the local media-server catalog
//!
//! Records are identified by the media server's integer row ids and carry
//! the raw external identifier ("guid") exactly as the server stores it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// ID Types
// =============================================================================

/// Identifier of a library section on the media server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(pub i64);

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Row id of a local item (show, season, episode or movie)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub i64);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of library a section holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Show,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Show => "show",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaKind::Movie),
            "show" => Ok(MediaKind::Show),
            other => Err(format!("Unknown media kind: {}", other)),
        }
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// A library section (e.g. "TV Shows", "Anime")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySection {
    pub id: SectionId,
    pub kind: MediaKind,
    pub title: String,
}

impl LibrarySection {
    pub fn new(id: i64, kind: MediaKind, title: impl Into<String>) -> Self {
        Self {
            id: SectionId(id),
            kind,
            title: title.into(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Section title cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Per-account view state the media server keeps for an item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalState {
    /// User rating on a 1..=10 scale
    pub rating: Option<u8>,
    /// Number of completed plays
    pub view_count: u32,
    /// Last time the item was watched
    pub last_viewed_at: Option<DateTime<Utc>>,
    /// Resume position in milliseconds
    pub view_offset_ms: Option<i64>,
}

impl LocalState {
    pub fn is_watched(&self) -> bool {
        self.view_count > 0
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(rating) = self.rating {
            if !(1..=10).contains(&rating) {
                return Err(format!("Rating {} is out of valid range", rating));
            }
        }

        if let Some(offset) = self.view_offset_ms {
            if offset < 0 {
                return Err("View offset cannot be negative".to_string());
            }
        }

        Ok(())
    }
}

/// Local show record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalShow {
    pub id: LocalId,
    pub section: SectionId,
    pub title: String,
    /// Raw external identifier, e.g. `com.plexapp.agents.thetvdb://81189?lang=en`
    pub guid: String,
    pub year: Option<i32>,
    pub state: LocalState,
}

impl LocalShow {
    pub fn new(id: i64, section: i64, title: impl Into<String>, guid: impl Into<String>) -> Self {
        Self {
            id: LocalId(id),
            section: SectionId(section),
            title: title.into(),
            guid: guid.into(),
            year: None,
            state: LocalState::default(),
        }
    }

    pub fn with_state(mut self, state: LocalState) -> Self {
        self.state = state;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Show title cannot be empty".to_string());
        }

        if let Some(year) = self.year {
            if !(1900..=2100).contains(&year) {
                return Err(format!("Show year {} is out of valid range", year));
            }
        }

        self.state.validate()
    }
}

/// Local season record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSeason {
    pub id: LocalId,
    pub show: LocalId,
    pub index: u32,
    pub state: LocalState,
}

/// Local row ids an episode is addressed by
///
/// The episode id may be missing for items the server has not fully indexed;
/// such episodes cannot be addressed downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeIds {
    pub show: LocalId,
    pub season: Option<LocalId>,
    pub episode: Option<LocalId>,
}

/// Season/episode numbering as the local catalog understands it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EpisodeNumber {
    pub season: u32,
    pub episode: u32,
}

impl EpisodeNumber {
    pub fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }
}

impl fmt::Display for EpisodeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}E{:02}", self.season, self.episode)
    }
}

/// Local episode record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalEpisode {
    pub ids: EpisodeIds,
    pub section: SectionId,
    /// Raw external identifier, usually inherited from the parent show
    pub guid: String,
    pub number: EpisodeNumber,
    pub title: String,
    pub state: LocalState,
}

impl LocalEpisode {
    pub fn new(
        ids: EpisodeIds,
        section: i64,
        guid: impl Into<String>,
        number: EpisodeNumber,
    ) -> Self {
        Self {
            ids,
            section: SectionId(section),
            guid: guid.into(),
            number,
            title: String::new(),
            state: LocalState::default(),
        }
    }

    pub fn with_state(mut self, state: LocalState) -> Self {
        self.state = state;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.ids.episode == Some(self.ids.show) {
            return Err("Episode id cannot equal its show id".to_string());
        }
        self.state.validate()
    }
}

/// Local movie record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalMovie {
    pub id: LocalId,
    pub section: SectionId,
    pub title: String,
    pub guid: String,
    pub year: Option<i32>,
    pub state: LocalState,
}

impl LocalMovie {
    pub fn new(id: i64, section: i64, title: impl Into<String>, guid: impl Into<String>) -> Self {
        Self {
            id: LocalId(id),
            section: SectionId(section),
            title: title.into(),
            guid: guid.into(),
            year: None,
            state: LocalState::default(),
        }
    }

    pub fn with_state(mut self, state: LocalState) -> Self {
        self.state = state;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Movie title cannot be empty".to_string());
        }

        if let Some(year) = self.year {
            if !(1900..=2100).contains(&year) {
                return Err(format!("Movie year {} is out of valid range", year));
            }
        }

        self.state.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_round_trip() {
        assert_eq!("show".parse::<MediaKind>().unwrap(), MediaKind::Show);
        assert_eq!(MediaKind::Movie.to_string(), "movie");
        assert!("artist".parse::<MediaKind>().is_err());
    }

    #[test]
    fn test_show_validation() {
        let mut show = LocalShow::new(1, 2, "Community", "tvdb://94571");
        assert!(show.validate().is_ok());

        show.year = Some(1800);
        assert!(show.validate().is_err());

        show.year = Some(2009);
        show.title = "   ".to_string();
        assert!(show.validate().is_err());
    }

    #[test]
    fn test_state_validation() {
        let state = LocalState {
            rating: Some(11),
            ..Default::default()
        };
        assert!(state.validate().is_err());

        let state = LocalState {
            view_offset_ms: Some(-5),
            ..Default::default()
        };
        assert!(state.validate().is_err());

        let state = LocalState {
            rating: Some(8),
            view_count: 2,
            ..Default::default()
        };
        assert!(state.validate().is_ok());
        assert!(state.is_watched());
    }

    #[test]
    fn test_episode_validation() {
        let ids = EpisodeIds {
            show: LocalId(10),
            season: Some(LocalId(11)),
            episode: Some(LocalId(10)),
        };
        let episode = LocalEpisode::new(ids, 1, "tvdb://1", EpisodeNumber::new(1, 1));
        assert!(episode.validate().is_err());
    }

    #[test]
    fn test_episode_number_display() {
        assert_eq!(EpisodeNumber::new(1, 5).to_string(), "S01E05");
        assert!(EpisodeNumber::new(1, 9) < EpisodeNumber::new(2, 1));
    }

    #[test]
    fn test_id_types_display() {
        assert_eq!(SectionId(3).to_string(), "3");
        assert_eq!(LocalId(42).to_string(), "42");
    }

    #[test]
    fn test_section_validation() {
        assert!(LibrarySection::new(1, MediaKind::Show, "TV").validate().is_ok());
        assert!(LibrarySection::new(1, MediaKind::Show, "").validate().is_err());
    }
}
