//! # Reconciliation Engine
//!
//! Matches local catalog items against the remote catalog and dispatches
//! every matched pair to the handlers of the active data types.
//!
//! ## Passes
//!
//! - **Show pass**: parse each show's identifier, look up its pk, record the
//!   attempted mapping in the item map, dispatch show-level handlers.
//! - **Episode pass**: parse each episode's identifier with its local
//!   numbering, walk the remote tree show → season → episode per data type,
//!   dispatch, mark the unit resolved, checkpoint.
//! - **Movie pass**: like the show pass against the `movies` table.
//!
//! Every skip is an expected condition: it is counted in
//! [`ReconcileStats`], reported to the [`ReconcileObserver`] and never
//! raised. Catalog failures abort the run. Handler failures follow the
//! configured [`HandlerFailurePolicy`].
//!
//! ## State
//!
//! All mutable state of a run lives in [`ReconcileState`], owned by the
//! caller and passed in by reference. Two runs may execute concurrently only
//! with separate states.

use crate::error::{Result, SyncError};
use crate::guid::{ExternalRef, GuidMatch, GuidParser};
use crate::handler::{HandlerFailurePolicy, HandlerRegistry, LocalItem, RemoteItem};
use crate::item_map::ItemMap;
use crate::media::{DataSelection, SyncData, SyncMedia};
use crate::observer::ReconcileObserver;
use crate::pending::{PendingKey, PendingTracker};
use crate::remote::RemoteCatalog;
use crate::table::TableName;
use crate::unsupported::{UnsupportedAggregator, UnsupportedSummary};
use bridge_traits::checkpoint::CheckpointSink;
use core_library::{
    CatalogQuery, EpisodeListing, LibraryCatalog, LocalEpisode, LocalId, LocalMovie, LocalShow,
    MediaKind, SectionId, SectionSet,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Per-run options of the engine
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Active data types per media level
    pub selection: DataSelection,
    /// Only these sections are reconciled; `None` means all
    pub sections: Option<Vec<SectionId>>,
    /// Media-server account forwarded to catalog reads
    pub account: Option<String>,
    pub failure_policy: HandlerFailurePolicy,
}

/// Terminal-state counters of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub shows_seen: u64,
    pub episodes_seen: u64,
    pub movies_seen: u64,
    /// Identifier from an unknown service
    pub unsupported: u64,
    /// Supported identifier that resolved to nothing
    pub not_found: u64,
    /// Reference unknown to the remote key table
    pub no_pk: u64,
    /// Identifier resolved but no remote numbering came back
    pub numbering_unresolved: u64,
    /// Matched episode without a local episode id
    pub missing_local_id: u64,
    /// Remote show, season or episode node missing for a data type
    pub payload_missing: u64,
    /// Units that reached handler dispatch without a handler failure,
    /// counted once per data type whether or not a handler is bound
    pub dispatched: u64,
    /// Handler invocations that completed
    #[serde(default)]
    pub handler_calls: u64,
    /// Units flipped to resolved in the pending tracker
    pub pending_marked: u64,
    /// Handler failures skipped under [`HandlerFailurePolicy::SkipUnit`]
    pub handler_failures: u64,
}

impl ReconcileStats {
    pub fn items_processed(&self) -> u64 {
        self.shows_seen + self.episodes_seen + self.movies_seen
    }

    pub fn skipped(&self) -> u64 {
        self.unsupported
            + self.not_found
            + self.no_pk
            + self.numbering_unresolved
            + self.missing_local_id
            + self.payload_missing
    }
}

/// Mutable state of one run
#[derive(Debug, Clone, Default)]
pub struct ReconcileState {
    pub item_map: ItemMap,
    pub pending: PendingTracker,
    pub unsupported_shows: UnsupportedAggregator,
    pub unsupported_movies: UnsupportedAggregator,
    pub stats: ReconcileStats,
}

impl ReconcileState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Summary of one completed pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub media_kind: MediaKind,
    pub stats: ReconcileStats,
    pub unsupported: UnsupportedSummary,
    /// Unresolved remote units per data type
    pub pending: BTreeMap<SyncData, usize>,
}

pub struct Reconciler {
    catalog: Arc<dyn LibraryCatalog>,
    handlers: Arc<HandlerRegistry>,
    parser: GuidParser,
    observer: Arc<dyn ReconcileObserver>,
    options: ReconcileOptions,
    cancel: CancellationToken,
}

impl Reconciler {
    pub fn new(
        catalog: Arc<dyn LibraryCatalog>,
        handlers: Arc<HandlerRegistry>,
        parser: GuidParser,
        observer: Arc<dyn ReconcileObserver>,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            catalog,
            handlers,
            parser,
            observer,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop the run with [`SyncError::Cancelled`] at the next checkpoint
    /// after `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    fn query(&self) -> CatalogQuery {
        CatalogQuery {
            account: self.options.account.clone(),
        }
    }

    async fn sections(&self, kind: MediaKind) -> Result<SectionSet> {
        let sections = self.catalog.sections(kind).await?;
        Ok(match &self.options.sections {
            Some(allowed) => sections.retain_allowed(allowed),
            None => sections,
        })
    }

    /// Read the local shows, seasons and episodes to reconcile.
    pub async fn load_shows(&self) -> Result<EpisodeListing> {
        let sections = self.sections(MediaKind::Show).await?;
        if sections.is_empty() {
            debug!("No show sections to reconcile");
            return Ok(EpisodeListing::default());
        }

        let listing = self.catalog.episodes(&sections, &self.query()).await?;
        debug!(
            sections = sections.len(),
            shows = listing.shows.len(),
            episodes = listing.episodes.len(),
            "Loaded local show catalog"
        );
        Ok(listing)
    }

    /// Read the local movies to reconcile.
    pub async fn load_movies(&self) -> Result<Vec<LocalMovie>> {
        let sections = self.sections(MediaKind::Movie).await?;
        if sections.is_empty() {
            debug!("No movie sections to reconcile");
            return Ok(Vec::new());
        }

        Ok(self.catalog.movies(&sections, &self.query()).await?)
    }

    /// Load and reconcile shows and episodes.
    pub async fn run_shows(
        &self,
        remote: &RemoteCatalog,
        state: &mut ReconcileState,
        checkpoint: &dyn CheckpointSink,
    ) -> Result<ReconcileReport> {
        let listing = self.load_shows().await?;
        self.reconcile_shows(&listing, remote, state, checkpoint).await
    }

    /// Load and reconcile movies.
    pub async fn run_movies(
        &self,
        remote: &RemoteCatalog,
        state: &mut ReconcileState,
        checkpoint: &dyn CheckpointSink,
    ) -> Result<ReconcileReport> {
        let movies = self.load_movies().await?;
        self.reconcile_movies(&movies, remote, state, checkpoint).await
    }

    /// Seed, run the show pass, run the episode pass, report.
    #[instrument(skip_all, fields(shows = listing.shows.len(), episodes = listing.episodes.len()))]
    pub async fn reconcile_shows(
        &self,
        listing: &EpisodeListing,
        remote: &RemoteCatalog,
        state: &mut ReconcileState,
        checkpoint: &dyn CheckpointSink,
    ) -> Result<ReconcileReport> {
        self.seed_pending(remote, &mut state.pending);
        self.show_pass(&listing.shows, remote, state).await?;
        self.episode_pass(&listing.episodes, remote, state, checkpoint)
            .await?;

        let unsupported = state.unsupported_shows.summarize();
        let pending = state.pending.remaining_by_type();

        self.observer
            .unsupported_summary(SyncMedia::Shows, &unsupported);
        self.observer.pending_summary(&pending);

        info!(
            dispatched = state.stats.dispatched,
            skipped = state.stats.skipped(),
            unsupported_shows = unsupported.count,
            "Show reconciliation finished"
        );

        Ok(ReconcileReport {
            media_kind: MediaKind::Show,
            stats: state.stats,
            unsupported,
            pending,
        })
    }

    #[instrument(skip_all, fields(movies = movies.len()))]
    pub async fn reconcile_movies(
        &self,
        movies: &[LocalMovie],
        remote: &RemoteCatalog,
        state: &mut ReconcileState,
        checkpoint: &dyn CheckpointSink,
    ) -> Result<ReconcileReport> {
        self.movie_pass(movies, remote, state, checkpoint).await?;

        let unsupported = state.unsupported_movies.summarize();
        self.observer
            .unsupported_summary(SyncMedia::Movies, &unsupported);

        info!(
            dispatched = state.stats.dispatched,
            skipped = state.stats.skipped(),
            unsupported_movies = unsupported.count,
            "Movie reconciliation finished"
        );

        Ok(ReconcileReport {
            media_kind: MediaKind::Movie,
            stats: state.stats,
            unsupported,
            pending: BTreeMap::new(),
        })
    }

    /// Register every remote episode unit of the active data types as unresolved.
    pub fn seed_pending(&self, remote: &RemoteCatalog, pending: &mut PendingTracker) {
        for data in self.options.selection.get(SyncMedia::Episodes) {
            let units = remote.episode_units(data);
            debug!(data = %data, units = units.len(), "Seeding pending units");
            pending.seed(data, units);
        }
    }

    /// Reference of a parse result, recording the skip when there is none.
    fn resolve(
        &self,
        media: SyncMedia,
        owner: LocalId,
        result: &GuidMatch,
        unsupported: &mut UnsupportedAggregator,
        stats: &mut ReconcileStats,
    ) -> Option<ExternalRef> {
        if !result.supported {
            unsupported.mark(owner, &result.raw);
            stats.unsupported += 1;
            return None;
        }

        match (&result.reference, result.found) {
            (Some(reference), true) => Some(reference.clone()),
            _ => {
                self.observer
                    .identifier_not_found(media, owner, &result.raw);
                stats.not_found += 1;
                None
            }
        }
    }

    pub async fn show_pass(
        &self,
        shows: &[LocalShow],
        remote: &RemoteCatalog,
        state: &mut ReconcileState,
    ) -> Result<()> {
        let active = self.options.selection.get(SyncMedia::Shows);

        for show in shows {
            state.stats.shows_seen += 1;

            let result = self.parser.parse(&show.guid, None);
            let Some(key) = self.resolve(
                SyncMedia::Shows,
                show.id,
                &result,
                &mut state.unsupported_shows,
                &mut state.stats,
            ) else {
                continue;
            };

            let pk = remote.lookup(TableName::Shows, &key).cloned();
            state
                .item_map
                .add(show.section, show.id, key, pk.clone());

            let Some(pk) = pk else {
                state.stats.no_pk += 1;
                continue;
            };

            let local = LocalItem::Show(show.clone());
            for &data in &active {
                let payload = remote
                    .show(SyncMedia::Shows, data, &pk)
                    .cloned()
                    .map(RemoteItem::Show);

                self.dispatch(
                    SyncMedia::Shows,
                    data,
                    show.id,
                    &local,
                    payload.as_ref(),
                    &mut state.stats,
                )
                .await?;
            }
        }

        Ok(())
    }

    pub async fn episode_pass(
        &self,
        episodes: &[LocalEpisode],
        remote: &RemoteCatalog,
        state: &mut ReconcileState,
        checkpoint: &dyn CheckpointSink,
    ) -> Result<()> {
        for episode in episodes {
            state.stats.episodes_seen += 1;

            if !self.reconcile_episode(episode, remote, state).await? {
                continue;
            }

            checkpoint.checkpoint().await;
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
        }

        Ok(())
    }

    /// Returns `true` when the episode reached the data-type loop.
    async fn reconcile_episode(
        &self,
        episode: &LocalEpisode,
        remote: &RemoteCatalog,
        state: &mut ReconcileState,
    ) -> Result<bool> {
        let owner = episode.ids.show;
        let result = self.parser.parse(&episode.guid, Some(episode.number));

        let Some(key) = self.resolve(
            SyncMedia::Episodes,
            owner,
            &result,
            &mut state.unsupported_shows,
            &mut state.stats,
        ) else {
            return Ok(false);
        };

        let Some(number) = result.first_episode() else {
            self.observer.numbering_unresolved(owner, &result.raw);
            state.stats.numbering_unresolved += 1;
            return Ok(false);
        };

        let Some(pk) = remote.lookup(TableName::Shows, &key) else {
            state.stats.no_pk += 1;
            return Ok(false);
        };

        let Some(episode_id) = episode.ids.episode else {
            self.observer.missing_local_episode_id(&episode.ids);
            state.stats.missing_local_id += 1;
            return Ok(false);
        };

        let local = LocalItem::Episode(episode.clone());
        for data in self.options.selection.get(SyncMedia::Episodes) {
            let Some(remote_episode) = remote
                .show(SyncMedia::Episodes, data, pk)
                .and_then(|show| show.season(number.season))
                .and_then(|season| season.episode(number.episode))
            else {
                state.stats.payload_missing += 1;
                continue;
            };

            let payload = RemoteItem::Episode(remote_episode.clone());
            self.dispatch(
                SyncMedia::Episodes,
                data,
                episode_id,
                &local,
                Some(&payload),
                &mut state.stats,
            )
            .await?;

            let unit = PendingKey::new(pk.clone(), number.season, number.episode);
            if state.pending.mark_resolved(data, unit) {
                state.stats.pending_marked += 1;
            }
        }

        Ok(true)
    }

    pub async fn movie_pass(
        &self,
        movies: &[LocalMovie],
        remote: &RemoteCatalog,
        state: &mut ReconcileState,
        checkpoint: &dyn CheckpointSink,
    ) -> Result<()> {
        let active = self.options.selection.get(SyncMedia::Movies);

        for movie in movies {
            state.stats.movies_seen += 1;

            let result = self.parser.parse(&movie.guid, None);
            let Some(key) = self.resolve(
                SyncMedia::Movies,
                movie.id,
                &result,
                &mut state.unsupported_movies,
                &mut state.stats,
            ) else {
                continue;
            };

            let pk = remote.lookup(TableName::Movies, &key).cloned();
            state
                .item_map
                .add(movie.section, movie.id, key, pk.clone());

            let Some(pk) = pk else {
                state.stats.no_pk += 1;
                continue;
            };

            let local = LocalItem::Movie(movie.clone());
            for &data in &active {
                let payload = remote.movie(data, &pk).cloned().map(RemoteItem::Movie);
                self.dispatch(
                    SyncMedia::Movies,
                    data,
                    movie.id,
                    &local,
                    payload.as_ref(),
                    &mut state.stats,
                )
                .await?;
            }

            checkpoint.checkpoint().await;
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
        }

        Ok(())
    }

    async fn dispatch(
        &self,
        media: SyncMedia,
        data: SyncData,
        key: LocalId,
        local: &LocalItem,
        remote: Option<&RemoteItem>,
        stats: &mut ReconcileStats,
    ) -> Result<()> {
        match self.handlers.execute(media, data, key, local, remote).await {
            Ok(applied) => {
                stats.dispatched += 1;
                stats.handler_calls += applied as u64;
                Ok(())
            }
            Err(err) if self.options.failure_policy == HandlerFailurePolicy::SkipUnit => {
                self.observer.handler_failed(&err);
                stats.handler_failures += 1;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::Service;
    use crate::remote::{RemoteShow, RemoteState};
    use bridge_traits::checkpoint::NoopCheckpoint;
    use core_library::{EpisodeIds, EpisodeNumber, InMemoryCatalog};

    fn reconciler(selection: DataSelection) -> Reconciler {
        Reconciler::new(
            Arc::new(InMemoryCatalog::new()),
            Arc::new(HandlerRegistry::new()),
            GuidParser::default(),
            Arc::new(crate::observer::TracingObserver),
            ReconcileOptions {
                selection,
                ..Default::default()
            },
        )
    }

    fn remote() -> RemoteCatalog {
        let mut remote = RemoteCatalog::new();
        remote
            .insert_key(TableName::Shows, ExternalRef::new(Service::Tvdb, "100"), "P1")
            .insert_show(
                SyncMedia::Episodes,
                SyncData::Watched,
                RemoteShow::new("P1")
                    .with_episode(1, 1, RemoteState::default())
                    .with_episode(1, 2, RemoteState::default()),
            );
        remote
    }

    fn episode(id: Option<i64>, guid: &str, season: u32, number: u32) -> LocalEpisode {
        LocalEpisode::new(
            EpisodeIds {
                show: LocalId(10),
                season: Some(LocalId(11)),
                episode: id.map(LocalId),
            },
            1,
            guid,
            EpisodeNumber::new(season, number),
        )
    }

    #[tokio::test]
    async fn test_episode_pass_terminal_states() {
        let selection = DataSelection::none().with(SyncMedia::Episodes, SyncData::Watched);
        let engine = reconciler(selection);
        let remote = remote();
        let mut state = ReconcileState::new();
        engine.seed_pending(&remote, &mut state.pending);

        let episodes = vec![
            episode(Some(12), "tvdb://100", 1, 1),
            episode(Some(13), "foo://100", 1, 2),
            episode(Some(14), "tvdb://abc", 1, 2),
            episode(Some(15), "tvdb://200", 1, 2),
            episode(None, "tvdb://100", 1, 2),
            episode(Some(16), "tvdb://100", 3, 1),
        ];

        engine
            .episode_pass(&episodes, &remote, &mut state, &NoopCheckpoint)
            .await
            .unwrap();

        let stats = state.stats;
        assert_eq!(stats.episodes_seen, 6);
        assert_eq!(stats.dispatched, 1);
        // No handler is bound in this engine.
        assert_eq!(stats.handler_calls, 0);
        assert_eq!(stats.pending_marked, 1);
        assert_eq!(stats.unsupported, 1);
        assert_eq!(stats.not_found, 1);
        assert_eq!(stats.no_pk, 1);
        assert_eq!(stats.missing_local_id, 1);
        assert_eq!(stats.payload_missing, 1);
        assert_eq!(stats.skipped() + stats.dispatched, stats.episodes_seen);

        assert_eq!(state.pending.remaining(SyncData::Watched), 1);
        assert_eq!(state.unsupported_shows.count(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_at_checkpoint() {
        let selection = DataSelection::none().with(SyncMedia::Episodes, SyncData::Watched);
        let token = CancellationToken::new();
        let engine = reconciler(selection).with_cancellation(token.clone());
        let remote = remote();
        let mut state = ReconcileState::new();

        token.cancel();
        let episodes = vec![
            episode(Some(12), "tvdb://100", 1, 1),
            episode(Some(13), "tvdb://100", 1, 2),
        ];

        let result = engine
            .episode_pass(&episodes, &remote, &mut state, &NoopCheckpoint)
            .await;

        assert!(matches!(result, Err(SyncError::Cancelled)));
        // The first episode's dispatch happened before the checkpoint.
        assert_eq!(state.stats.episodes_seen, 1);
        assert_eq!(state.stats.dispatched, 1);
    }

    #[test]
    fn test_stats_totals() {
        let stats = ReconcileStats {
            shows_seen: 2,
            episodes_seen: 5,
            movies_seen: 1,
            unsupported: 1,
            not_found: 1,
            no_pk: 1,
            numbering_unresolved: 1,
            missing_local_id: 1,
            payload_missing: 2,
            ..Default::default()
        };
        assert_eq!(stats.items_processed(), 8);
        assert_eq!(stats.skipped(), 7);
    }
}
