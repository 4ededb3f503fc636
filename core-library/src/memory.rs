//! In-memory catalog
//!
//! A [`LibraryCatalog`] backed by plain vectors. Hosts that already hold the
//! catalog in memory (or tests) can load it here instead of implementing the
//! trait themselves.

use crate::catalog::{CatalogQuery, EpisodeListing, LibraryCatalog, SectionSet};
use crate::error::{LibraryError, Result};
use crate::models::{
    LibrarySection, LocalEpisode, LocalId, LocalMovie, LocalSeason, LocalShow, LocalState,
    MediaKind,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    sections: Vec<LibrarySection>,
    shows: Vec<LocalShow>,
    seasons: Vec<LocalSeason>,
    episodes: Vec<LocalEpisode>,
    movies: Vec<LocalMovie>,
    account_states: HashMap<(String, LocalId), LocalState>,
}

fn invalid(field: &str, message: String) -> LibraryError {
    LibraryError::InvalidInput {
        field: field.to_string(),
        message,
    }
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_section(&mut self, section: LibrarySection) -> Result<&mut Self> {
        section.validate().map_err(|m| invalid("section", m))?;
        if self.sections.iter().any(|s| s.id == section.id) {
            return Err(invalid(
                "section",
                format!("Section {} already exists", section.id),
            ));
        }
        self.sections.push(section);
        Ok(self)
    }

    pub fn add_show(&mut self, show: LocalShow) -> Result<&mut Self> {
        show.validate().map_err(|m| invalid("show", m))?;
        self.shows.push(show);
        Ok(self)
    }

    pub fn add_season(&mut self, season: LocalSeason) -> Result<&mut Self> {
        if !self.shows.iter().any(|s| s.id == season.show) {
            return Err(LibraryError::NotFound {
                entity_type: "show".to_string(),
                id: season.show.to_string(),
            });
        }
        self.seasons.push(season);
        Ok(self)
    }

    /// Episodes may reference shows the catalog does not list; the media
    /// server occasionally keeps orphaned rows and the engine must cope.
    pub fn add_episode(&mut self, episode: LocalEpisode) -> Result<&mut Self> {
        episode.validate().map_err(|m| invalid("episode", m))?;
        self.episodes.push(episode);
        Ok(self)
    }

    pub fn add_movie(&mut self, movie: LocalMovie) -> Result<&mut Self> {
        movie.validate().map_err(|m| invalid("movie", m))?;
        self.movies.push(movie);
        Ok(self)
    }

    /// Override the view state of `item` for reads issued on behalf of `account`.
    pub fn set_account_state(
        &mut self,
        account: impl Into<String>,
        item: LocalId,
        state: LocalState,
    ) -> Result<&mut Self> {
        state.validate().map_err(|m| invalid("state", m))?;
        self.account_states.insert((account.into(), item), state);
        Ok(self)
    }

    fn state_for(&self, query: &CatalogQuery, item: LocalId, fallback: &LocalState) -> LocalState {
        query
            .account
            .as_ref()
            .and_then(|account| self.account_states.get(&(account.clone(), item)))
            .cloned()
            .unwrap_or_else(|| fallback.clone())
    }
}

#[async_trait]
impl LibraryCatalog for InMemoryCatalog {
    async fn sections(&self, kind: MediaKind) -> Result<SectionSet> {
        let sections: Vec<_> = self
            .sections
            .iter()
            .filter(|section| section.kind == kind)
            .cloned()
            .collect();

        debug!(kind = %kind, count = sections.len(), "Listing sections");
        Ok(SectionSet::new(sections))
    }

    async fn episodes(
        &self,
        sections: &SectionSet,
        query: &CatalogQuery,
    ) -> Result<EpisodeListing> {
        let shows: Vec<LocalShow> = self
            .shows
            .iter()
            .filter(|show| sections.contains(show.section))
            .map(|show| {
                let mut show = show.clone();
                show.state = self.state_for(query, show.id, &show.state);
                show
            })
            .collect();

        let seasons = self
            .seasons
            .iter()
            .filter(|season| shows.iter().any(|show| show.id == season.show))
            .map(|season| {
                let mut season = season.clone();
                season.state = self.state_for(query, season.id, &season.state);
                season
            })
            .collect();

        let episodes = self
            .episodes
            .iter()
            .filter(|episode| sections.contains(episode.section))
            .map(|episode| {
                let mut episode = episode.clone();
                if let Some(id) = episode.ids.episode {
                    episode.state = self.state_for(query, id, &episode.state);
                }
                episode
            })
            .collect();

        Ok(EpisodeListing {
            shows,
            seasons,
            episodes,
        })
    }

    async fn movies(&self, sections: &SectionSet, query: &CatalogQuery) -> Result<Vec<LocalMovie>> {
        Ok(self
            .movies
            .iter()
            .filter(|movie| sections.contains(movie.section))
            .map(|movie| {
                let mut movie = movie.clone();
                movie.state = self.state_for(query, movie.id, &movie.state);
                movie
            })
            .collect())
    }
}
