//! # Reconcile Coordinator
//!
//! Runs reconciliation jobs end to end.
//!
//! ## Overview
//!
//! The `ReconcileCoordinator` owns the long-lived collaborators (catalog
//! reader, handler registry, identifier parser, observer, repositories,
//! event bus) and, per run:
//! - refuses a second concurrent run for the same media kind
//! - creates and persists a [`ReconcileJob`]
//! - builds a fresh [`ReconcileState`] and drives the [`Reconciler`] with a
//!   [`JobCheckpoint`] sink
//! - honours [`cancel`](ReconcileCoordinator::cancel) at the next checkpoint
//! - persists the item map and finalises the job with events
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::ReconcileCoordinator;
//! use core_library::MediaKind;
//!
//! let outcome = coordinator.run(MediaKind::Show, &remote).await?;
//! println!("dispatched {}", outcome.report.stats.dispatched);
//!
//! // Or in the background
//! let job_id = coordinator.start(MediaKind::Show, Arc::new(remote)).await?;
//! coordinator.cancel(job_id).await?;
//! ```

use crate::checkpoint::{JobCheckpoint, DEFAULT_CHECKPOINT_INTERVAL};
use crate::db::{create_pool, DatabaseConfig};
use crate::engine::{ReconcileOptions, ReconcileReport, ReconcileState, Reconciler};
use crate::guid::GuidParser;
use crate::handler::{HandlerFailurePolicy, HandlerRegistry};
use crate::item_map::ItemMap;
use crate::job::{ReconcileJob, ReconcileJobId};
use crate::mapping::MappingTable;
use crate::media::DataSelection;
use crate::observer::{ReconcileObserver, TracingObserver};
use crate::remote::RemoteCatalog;
use crate::repository::{
    ItemMapRepository, ReconcileJobRepository, SqliteItemMapRepository,
    SqliteReconcileJobRepository,
};
use crate::{Result, SyncError};
use bridge_traits::time::{Clock, SystemClock};
use core_library::{LibraryCatalog, MediaKind, SectionId};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, ReconcileEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Reconcile coordinator configuration
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Active data types per media level
    pub selection: DataSelection,

    /// Section allowlist; `None` reconciles every section
    pub sections: Option<Vec<SectionId>>,

    /// Media-server account forwarded to the catalog reader
    pub account: Option<String>,

    pub failure_policy: HandlerFailurePolicy,

    /// Persist progress every this many checkpoints
    pub checkpoint_interval: u64,

    /// Allow movie runs
    pub enable_movies: bool,

    /// Save the item map at the end of a completed run
    pub persist_item_map: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            selection: DataSelection::all(),
            sections: None,
            account: None,
            failure_policy: HandlerFailurePolicy::Abort,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            enable_movies: false,
            persist_item_map: true,
        }
    }
}

impl ReconcileConfig {
    /// Engine options derived from this configuration.
    pub fn options(&self) -> ReconcileOptions {
        ReconcileOptions {
            selection: self.selection.clone(),
            sections: self.sections.clone(),
            account: self.account.clone(),
            failure_policy: self.failure_policy,
        }
    }
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub job: ReconcileJob,
    pub report: ReconcileReport,
    pub item_map: ItemMap,
}

#[derive(Clone)]
struct ActiveRun {
    job_id: ReconcileJobId,
    cancellation_token: CancellationToken,
}

pub struct ReconcileCoordinator {
    config: ReconcileConfig,
    catalog: Arc<dyn LibraryCatalog>,
    handlers: Arc<HandlerRegistry>,
    parser: GuidParser,
    observer: Arc<dyn ReconcileObserver>,
    job_repository: Arc<dyn ReconcileJobRepository>,
    item_map_repository: Arc<dyn ItemMapRepository>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,

    /// Active runs by media kind
    active_runs: Arc<Mutex<HashMap<MediaKind, ActiveRun>>>,
}

impl ReconcileCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ReconcileConfig,
        catalog: Arc<dyn LibraryCatalog>,
        handlers: Arc<HandlerRegistry>,
        parser: GuidParser,
        observer: Arc<dyn ReconcileObserver>,
        job_repository: Arc<dyn ReconcileJobRepository>,
        item_map_repository: Arc<dyn ItemMapRepository>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            config,
            catalog,
            handlers,
            parser,
            observer,
            job_repository,
            item_map_repository,
            event_bus,
            clock: Arc::new(SystemClock),
            active_runs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Time source for job timestamps. Defaults to the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build a coordinator from the runtime configuration.
    ///
    /// Opens the SQLite database at `database_path`, loads numbering
    /// mappings from `mapping_path` when set, and sizes the event bus from
    /// `event_buffer_size`. Job timestamps come from the configured clock.
    /// Feature flags override the matching fields of
    /// `config`. Diagnostics go to a [`TracingObserver`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the database
    /// cannot be opened, or the mapping file cannot be read.
    pub async fn from_core_config(
        core: &CoreConfig,
        mut config: ReconcileConfig,
        catalog: Arc<dyn LibraryCatalog>,
        handlers: Arc<HandlerRegistry>,
    ) -> Result<Self> {
        core.validate()?;

        let pool = create_pool(DatabaseConfig::new(&core.database_path)).await?;

        let mappings = match &core.mapping_path {
            Some(path) => MappingTable::load(path).await?,
            None => MappingTable::new(),
        };
        info!(mappings = mappings.len(), "Numbering mappings loaded");

        config.enable_movies = core.features.enable_movies;
        config.persist_item_map = core.features.persist_item_map;

        Ok(Self::new(
            config,
            catalog,
            handlers,
            GuidParser::new(Arc::new(mappings)),
            Arc::new(TracingObserver),
            Arc::new(SqliteReconcileJobRepository::new(pool.clone())),
            Arc::new(SqliteItemMapRepository::new(pool)),
            EventBus::new(core.event_buffer_size),
        )
        .with_clock(Arc::clone(&core.clock)))
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Run a reconciliation for `kind` and wait for it to finish.
    ///
    /// # Errors
    ///
    /// - [`SyncError::SyncInProgress`] if a run for `kind` is active
    /// - [`SyncError::Cancelled`] if the run was cancelled
    /// - any catalog, handler (under the abort policy) or database error
    pub async fn run(&self, kind: MediaKind, remote: &RemoteCatalog) -> Result<ReconcileOutcome> {
        let (job, token) = self.begin(kind).await?;
        let result = self.execute(job, token, remote).await;
        self.finish(kind).await;
        result
    }

    /// Start a reconciliation for `kind` in a background task.
    ///
    /// Returns the job id immediately; the outcome is recorded in the job
    /// record and announced on the event bus.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SyncInProgress`] if a run for `kind` is active.
    pub async fn start(
        self: &Arc<Self>,
        kind: MediaKind,
        remote: Arc<RemoteCatalog>,
    ) -> Result<ReconcileJobId> {
        let (job, token) = self.begin(kind).await?;
        let job_id = job.id;

        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            // The run gets its own task so a panicking handler still releases the guard.
            let runner = Arc::clone(&coordinator);
            let run = tokio::spawn(async move { runner.execute(job, token, &remote).await });
            let joined = run.await;
            coordinator.finish(kind).await;

            match joined {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    debug!(job_id = %job_id, error = %e, "Background reconciliation ended with error");
                }
                Err(e) => coordinator.abandoned(job_id, e.to_string()).await,
            }
        });

        Ok(job_id)
    }

    async fn begin(&self, kind: MediaKind) -> Result<(ReconcileJob, CancellationToken)> {
        if kind == MediaKind::Movie && !self.config.enable_movies {
            return Err(SyncError::InvalidMediaKind(
                "movie reconciliation is disabled".to_string(),
            ));
        }

        let mut active_runs = self.active_runs.lock().await;
        if active_runs.contains_key(&kind) {
            return Err(SyncError::SyncInProgress {
                media_kind: kind.to_string(),
            });
        }

        let clock = self.clock.as_ref();
        let job = ReconcileJob::new(kind)
            .stamped(clock)
            .start()?
            .stamped(clock);
        self.job_repository.insert(&job).await?;

        let cancellation_token = CancellationToken::new();
        active_runs.insert(
            kind,
            ActiveRun {
                job_id: job.id,
                cancellation_token: cancellation_token.clone(),
            },
        );
        drop(active_runs);

        self.event_bus
            .emit(CoreEvent::Reconcile(ReconcileEvent::Started {
                job_id: job.id.to_string(),
                media_kind: kind.to_string(),
            }))
            .ok();

        info!(job_id = %job.id, media_kind = %kind, "Started reconciliation");
        Ok((job, cancellation_token))
    }

    async fn finish(&self, kind: MediaKind) {
        self.active_runs.lock().await.remove(&kind);
    }

    #[instrument(skip_all, fields(job_id = %job.id, media_kind = %job.media_kind))]
    async fn execute(
        &self,
        mut job: ReconcileJob,
        token: CancellationToken,
        remote: &RemoteCatalog,
    ) -> Result<ReconcileOutcome> {
        let reconciler = Reconciler::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.handlers),
            self.parser.clone(),
            Arc::clone(&self.observer),
            self.config.options(),
        )
        .with_cancellation(token);

        let mut state = ReconcileState::new();
        let result = self.drive(&reconciler, &mut job, &mut state, remote).await;

        match result {
            Ok((report, processed)) => {
                match self.complete(job.clone(), &report, &state, processed).await {
                    Ok(job) => Ok(ReconcileOutcome {
                        job,
                        report,
                        item_map: state.item_map,
                    }),
                    Err(e) => {
                        self.failed(job, &state, &e).await?;
                        Err(e)
                    }
                }
            }
            Err(SyncError::Cancelled) => {
                self.cancelled(job, &state).await?;
                Err(SyncError::Cancelled)
            }
            Err(e) => {
                self.failed(job, &state, &e).await?;
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        reconciler: &Reconciler,
        job: &mut ReconcileJob,
        state: &mut ReconcileState,
        remote: &RemoteCatalog,
    ) -> Result<(ReconcileReport, u64)> {
        match job.media_kind {
            MediaKind::Show => {
                let listing = reconciler.load_shows().await?;
                let sink = self
                    .checkpoint_sink(job, listing.episodes.len() as u64, "Reconciling episodes")
                    .await?;
                let report = reconciler
                    .reconcile_shows(&listing, remote, state, &sink)
                    .await?;
                Ok((report, sink.processed()))
            }
            MediaKind::Movie => {
                let movies = reconciler.load_movies().await?;
                let sink = self
                    .checkpoint_sink(job, movies.len() as u64, "Reconciling movies")
                    .await?;
                let report = reconciler
                    .reconcile_movies(&movies, remote, state, &sink)
                    .await?;
                Ok((report, sink.processed()))
            }
        }
    }

    async fn checkpoint_sink(
        &self,
        job: &mut ReconcileJob,
        total: u64,
        phase: &str,
    ) -> Result<JobCheckpoint> {
        job.update_progress(0, total, phase)?;
        self.job_repository
            .update_progress(&job.id, &job.progress)
            .await?;

        Ok(JobCheckpoint::new(
            job.id,
            total,
            phase,
            Arc::clone(&self.job_repository),
            self.event_bus.clone(),
        )
        .with_interval(self.config.checkpoint_interval))
    }

    /// Persist the item map and finalise the job as completed.
    ///
    /// On error the caller still holds the running job and records it as
    /// failed.
    async fn complete(
        &self,
        mut job: ReconcileJob,
        report: &ReconcileReport,
        state: &ReconcileState,
        processed: u64,
    ) -> Result<ReconcileJob> {
        if self.config.persist_item_map {
            self.item_map_repository
                .save(job.media_kind, &state.item_map, self.clock.unix_timestamp())
                .await?;
            debug!(
                entries = state.item_map.len(),
                matched = state.item_map.matched(),
                "Item map persisted"
            );
        }

        let total = job.progress.items_discovered;
        let phase = job.progress.phase.clone();
        job.update_progress(processed, total, &phase)?;
        let job = job.complete(report.stats)?.stamped(self.clock.as_ref());
        self.job_repository.update(&job).await?;

        for (data, unresolved) in &report.pending {
            if *unresolved == 0 {
                continue;
            }
            self.event_bus
                .emit(CoreEvent::Reconcile(ReconcileEvent::DriftDetected {
                    job_id: job.id.to_string(),
                    data_type: data.to_string(),
                    unresolved: *unresolved as u64,
                }))
                .ok();
        }

        self.event_bus
            .emit(CoreEvent::Reconcile(ReconcileEvent::Completed {
                job_id: job.id.to_string(),
                items_processed: report.stats.items_processed(),
                dispatched: report.stats.dispatched,
                skipped: report.stats.skipped(),
                duration_secs: job.duration_secs().unwrap_or(0),
            }))
            .ok();

        info!(
            job_id = %job.id,
            dispatched = report.stats.dispatched,
            skipped = report.stats.skipped(),
            "Reconciliation completed"
        );

        Ok(job)
    }

    async fn cancelled(&self, job: ReconcileJob, state: &ReconcileState) -> Result<()> {
        let items_processed = state.stats.items_processed();
        let job = job.cancel()?.stamped(self.clock.as_ref());
        self.job_repository.update(&job).await?;

        self.event_bus
            .emit(CoreEvent::Reconcile(ReconcileEvent::Cancelled {
                job_id: job.id.to_string(),
                items_processed,
            }))
            .ok();

        info!(job_id = %job.id, items_processed, "Reconciliation cancelled");
        Ok(())
    }

    async fn failed(&self, job: ReconcileJob, state: &ReconcileState, err: &SyncError) -> Result<()> {
        error!(job_id = %job.id, error = %err, "Reconciliation failed");

        let items_processed = state.stats.items_processed();
        let job = job.fail(err.to_string())?.stamped(self.clock.as_ref());
        if let Err(e) = self.job_repository.update(&job).await {
            warn!(job_id = %job.id, error = %e, "Failed to persist failed job");
        }

        self.event_bus
            .emit(CoreEvent::Reconcile(ReconcileEvent::Failed {
                job_id: job.id.to_string(),
                message: err.to_string(),
                items_processed,
            }))
            .ok();

        Ok(())
    }

    /// Fail a job whose background task died before finalising it.
    async fn abandoned(&self, job_id: ReconcileJobId, reason: String) {
        error!(job_id = %job_id, reason = %reason, "Background reconciliation aborted");

        let job = match self.job_repository.find_by_id(&job_id).await {
            Ok(Some(job)) if job.status.is_active() => job,
            Ok(_) => return,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Failed to load aborted job");
                return;
            }
        };

        let message = format!("Reconciliation task aborted: {}", reason);
        let items_processed = job.progress.items_processed;
        let job = match job.fail(message.clone()) {
            Ok(job) => job.stamped(self.clock.as_ref()),
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Failed to mark aborted job");
                return;
            }
        };

        if let Err(e) = self.job_repository.update(&job).await {
            warn!(job_id = %job_id, error = %e, "Failed to persist aborted job");
        }

        self.event_bus
            .emit(CoreEvent::Reconcile(ReconcileEvent::Failed {
                job_id: job_id.to_string(),
                message,
                items_processed,
            }))
            .ok();
    }

    /// Request cancellation of an active run.
    ///
    /// The run stops at its next checkpoint and records the job as
    /// cancelled. Handler effects already applied are kept.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::JobNotFound`] if no active run has this id
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn cancel(&self, job_id: ReconcileJobId) -> Result<()> {
        let active_run = {
            let active_runs = self.active_runs.lock().await;
            active_runs
                .values()
                .find(|run| run.job_id == job_id)
                .cloned()
        };

        match active_run {
            Some(run) => {
                run.cancellation_token.cancel();
                info!("Cancellation requested");
                Ok(())
            }
            None => Err(SyncError::JobNotFound {
                job_id: job_id.to_string(),
            }),
        }
    }

    /// # Errors
    ///
    /// Returns [`SyncError::JobNotFound`] if the job is unknown
    pub async fn get_status(&self, job_id: ReconcileJobId) -> Result<ReconcileJob> {
        self.job_repository
            .find_by_id(&job_id)
            .await?
            .ok_or_else(|| SyncError::JobNotFound {
                job_id: job_id.to_string(),
            })
    }

    pub async fn list_history(&self, kind: MediaKind, limit: usize) -> Result<Vec<ReconcileJob>> {
        self.job_repository
            .get_history(kind, limit.try_into().unwrap_or(u32::MAX))
            .await
    }

    pub async fn is_active(&self, kind: MediaKind) -> bool {
        self.active_runs.lock().await.contains_key(&kind)
    }

    /// Item map saved by the last completed run for `kind`.
    pub async fn last_item_map(&self, kind: MediaKind) -> Result<ItemMap> {
        self.item_map_repository.load(kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::job::JobStatus;
    use async_trait::async_trait;
    use bridge_traits::time::FixedClock;
    use chrono::{TimeZone, Utc};
    use core_library::InMemoryCatalog;
    use mockall::mock;

    mock! {
        ItemMaps {}

        #[async_trait]
        impl ItemMapRepository for ItemMaps {
            async fn save(&self, kind: MediaKind, map: &ItemMap, updated_at: i64) -> Result<()>;
            async fn load(&self, kind: MediaKind) -> Result<ItemMap>;
        }
    }

    async fn coordinator(config: ReconcileConfig) -> ReconcileCoordinator {
        let pool = create_test_pool().await.unwrap();
        let item_maps = Arc::new(SqliteItemMapRepository::new(pool.clone()));
        coordinator_with(config, pool, item_maps)
    }

    fn coordinator_with(
        config: ReconcileConfig,
        pool: sqlx::SqlitePool,
        item_maps: Arc<dyn ItemMapRepository>,
    ) -> ReconcileCoordinator {
        ReconcileCoordinator::new(
            config,
            Arc::new(InMemoryCatalog::new()),
            Arc::new(HandlerRegistry::new()),
            GuidParser::default(),
            Arc::new(TracingObserver),
            Arc::new(SqliteReconcileJobRepository::new(pool)),
            item_maps,
            EventBus::new(32),
        )
    }

    #[test]
    fn test_default_config() {
        let config = ReconcileConfig::default();
        assert_eq!(config.checkpoint_interval, 50);
        assert_eq!(config.failure_policy, HandlerFailurePolicy::Abort);
        assert!(!config.enable_movies);
        assert!(config.persist_item_map);
        assert_eq!(config.options().selection, config.selection);
    }

    #[tokio::test]
    async fn test_run_on_empty_catalog_completes() {
        let coordinator = coordinator(ReconcileConfig::default()).await;
        let mut events = coordinator.event_bus().subscribe();

        let outcome = coordinator
            .run(MediaKind::Show, &RemoteCatalog::new())
            .await
            .unwrap();

        assert_eq!(outcome.job.status, JobStatus::Completed);
        assert!(outcome.item_map.is_empty());
        assert!(!coordinator.is_active(MediaKind::Show).await);

        let stored = coordinator.get_status(outcome.job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Completed);

        assert!(matches!(
            events.try_recv(),
            Ok(CoreEvent::Reconcile(ReconcileEvent::Started { .. }))
        ));
    }

    #[tokio::test]
    async fn test_job_timestamps_follow_clock() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap();
        let coordinator = coordinator(ReconcileConfig::default())
            .await
            .with_clock(Arc::new(FixedClock::new(start)));

        let outcome = coordinator
            .run(MediaKind::Show, &RemoteCatalog::new())
            .await
            .unwrap();

        let stored = coordinator.get_status(outcome.job.id).await.unwrap();
        assert_eq!(stored.created_at, start.timestamp());
        assert_eq!(stored.started_at, Some(start.timestamp()));
        assert_eq!(stored.completed_at, Some(start.timestamp()));
    }

    #[tokio::test]
    async fn test_item_map_saved_with_clock_time() {
        let start = Utc.with_ymd_and_hms(2024, 6, 2, 9, 30, 0).unwrap();
        let mut item_maps = MockItemMaps::new();
        item_maps
            .expect_save()
            .withf(move |kind, map, updated_at| {
                *kind == MediaKind::Show && map.is_empty() && *updated_at == start.timestamp()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let pool = create_test_pool().await.unwrap();
        let coordinator = coordinator_with(ReconcileConfig::default(), pool, Arc::new(item_maps))
            .with_clock(Arc::new(FixedClock::new(start)));

        coordinator
            .run(MediaKind::Show, &RemoteCatalog::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_item_map_save_failure_fails_job() {
        let mut item_maps = MockItemMaps::new();
        item_maps
            .expect_save()
            .returning(|_, _, _| Err(SyncError::Database("disk full".to_string())));

        let pool = create_test_pool().await.unwrap();
        let coordinator = coordinator_with(ReconcileConfig::default(), pool, Arc::new(item_maps));
        let mut events = coordinator.event_bus().subscribe();

        let result = coordinator.run(MediaKind::Show, &RemoteCatalog::new()).await;
        assert!(matches!(result, Err(SyncError::Database(_))));
        assert!(!coordinator.is_active(MediaKind::Show).await);

        let history = coordinator.list_history(MediaKind::Show, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, JobStatus::Failed);
        assert_eq!(
            history[0].error_message.as_deref(),
            Some("Database error: disk full")
        );

        let mut failed = false;
        let mut completed = false;
        while let Ok(event) = events.try_recv() {
            match event {
                CoreEvent::Reconcile(ReconcileEvent::Failed { .. }) => failed = true,
                CoreEvent::Reconcile(ReconcileEvent::Completed { .. }) => completed = true,
                _ => {}
            }
        }
        assert!(failed);
        assert!(!completed);
    }

    #[tokio::test]
    async fn test_movies_disabled_by_default() {
        let coordinator = coordinator(ReconcileConfig::default()).await;

        let result = coordinator.run(MediaKind::Movie, &RemoteCatalog::new()).await;
        assert!(matches!(result, Err(SyncError::InvalidMediaKind(_))));
        assert!(coordinator
            .list_history(MediaKind::Movie, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_cancel_unknown_job() {
        let coordinator = coordinator(ReconcileConfig::default()).await;
        assert!(matches!(
            coordinator.cancel(ReconcileJobId::new()).await,
            Err(SyncError::JobNotFound { .. })
        ));
    }
}
