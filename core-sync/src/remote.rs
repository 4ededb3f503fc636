//! Remote catalog tree
//!
//! The remote tracking service's view of the library, one tree per
//! `(media level, data type)`: show, then seasons keyed by number, then
//! episodes keyed by number. Every lookup returns `Option`; a missing node
//! is an ordinary condition the engine skips over.

use crate::guid::ExternalRef;
use crate::media::{SyncData, SyncMedia};
use crate::pending::PendingKey;
use crate::table::{KeyTable, Pk, TableName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Per-item state recorded by the remote service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteState {
    pub rating: Option<u8>,
    pub plays: u32,
    pub last_watched_at: Option<DateTime<Utc>>,
    pub collected_at: Option<DateTime<Utc>>,
    /// Playback progress in percent
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteEpisode {
    pub number: u32,
    pub state: RemoteState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteSeason {
    pub number: u32,
    pub state: RemoteState,
    pub episodes: BTreeMap<u32, RemoteEpisode>,
}

impl RemoteSeason {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            ..Default::default()
        }
    }

    pub fn episode(&self, number: u32) -> Option<&RemoteEpisode> {
        self.episodes.get(&number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteShow {
    pub pk: Pk,
    pub state: RemoteState,
    pub seasons: BTreeMap<u32, RemoteSeason>,
}

impl RemoteShow {
    pub fn new(pk: impl Into<Pk>) -> Self {
        Self {
            pk: pk.into(),
            state: RemoteState::default(),
            seasons: BTreeMap::new(),
        }
    }

    pub fn with_state(mut self, state: RemoteState) -> Self {
        self.state = state;
        self
    }

    /// Adds (or replaces) an episode, creating its season on demand.
    pub fn with_episode(mut self, season: u32, episode: u32, state: RemoteState) -> Self {
        self.seasons
            .entry(season)
            .or_insert_with(|| RemoteSeason::new(season))
            .episodes
            .insert(
                episode,
                RemoteEpisode {
                    number: episode,
                    state,
                },
            );
        self
    }

    pub fn season(&self, number: u32) -> Option<&RemoteSeason> {
        self.seasons.get(&number)
    }

    /// Every `(season, episode)` pair in the tree.
    pub fn episode_numbers(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.seasons
            .iter()
            .flat_map(|(season, node)| node.episodes.keys().map(move |episode| (*season, *episode)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteMovie {
    pub pk: Pk,
    pub state: RemoteState,
}

impl RemoteMovie {
    pub fn new(pk: impl Into<Pk>, state: RemoteState) -> Self {
        Self {
            pk: pk.into(),
            state,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RemoteCatalog {
    tables: HashMap<TableName, KeyTable>,
    shows: HashMap<(SyncMedia, SyncData), BTreeMap<Pk, RemoteShow>>,
    movies: HashMap<SyncData, BTreeMap<Pk, RemoteMovie>>,
}

impl RemoteCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_key(&mut self, table: TableName, key: ExternalRef, pk: impl Into<Pk>) -> &mut Self {
        self.tables.entry(table).or_default().insert(key, pk.into());
        self
    }

    pub fn insert_show(&mut self, media: SyncMedia, data: SyncData, show: RemoteShow) -> &mut Self {
        self.shows
            .entry((media, data))
            .or_default()
            .insert(show.pk.clone(), show);
        self
    }

    pub fn insert_movie(&mut self, data: SyncData, movie: RemoteMovie) -> &mut Self {
        self.movies
            .entry(data)
            .or_default()
            .insert(movie.pk.clone(), movie);
        self
    }

    pub fn table(&self, name: TableName) -> Option<&KeyTable> {
        self.tables.get(&name)
    }

    /// Pk for `key` in `table`, if the remote catalog knows it.
    pub fn lookup(&self, table: TableName, key: &ExternalRef) -> Option<&Pk> {
        self.tables.get(&table).and_then(|t| t.get(key))
    }

    pub fn show(&self, media: SyncMedia, data: SyncData, pk: &Pk) -> Option<&RemoteShow> {
        self.shows.get(&(media, data)).and_then(|tree| tree.get(pk))
    }

    pub fn movie(&self, data: SyncData, pk: &Pk) -> Option<&RemoteMovie> {
        self.movies.get(&data).and_then(|tree| tree.get(pk))
    }

    /// `(pk, show)` pairs of one tree, ordered by pk.
    pub fn iterate(
        &self,
        media: SyncMedia,
        data: SyncData,
    ) -> impl Iterator<Item = (&Pk, &RemoteShow)> + '_ {
        self.shows
            .get(&(media, data))
            .into_iter()
            .flat_map(|tree| tree.iter())
    }

    /// Every episode unit present remotely for `data`.
    pub fn episode_units(&self, data: SyncData) -> Vec<PendingKey> {
        self.iterate(SyncMedia::Episodes, data)
            .flat_map(|(pk, show)| {
                show.episode_numbers()
                    .map(move |(season, episode)| PendingKey::new(pk.clone(), season, episode))
            })
            .collect()
    }
}
