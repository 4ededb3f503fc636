//! Job progress checkpoints
//!
//! [`JobCheckpoint`] is the [`CheckpointSink`] the coordinator hands to the
//! engine. It counts checkpoints and, every `interval` of them and on the
//! last expected one, persists the job's progress and publishes a
//! [`ReconcileEvent::Progress`].

use crate::job::{ReconcileJobId, ReconcileProgress};
use crate::repository::ReconcileJobRepository;
use async_trait::async_trait;
use bridge_traits::checkpoint::CheckpointSink;
use core_runtime::events::{CoreEvent, EventBus, ReconcileEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

pub const DEFAULT_CHECKPOINT_INTERVAL: u64 = 50;

pub struct JobCheckpoint {
    job_id: ReconcileJobId,
    total: u64,
    interval: u64,
    phase: String,
    processed: AtomicU64,
    repository: Arc<dyn ReconcileJobRepository>,
    event_bus: EventBus,
}

impl JobCheckpoint {
    pub fn new(
        job_id: ReconcileJobId,
        total: u64,
        phase: impl Into<String>,
        repository: Arc<dyn ReconcileJobRepository>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            job_id,
            total,
            interval: DEFAULT_CHECKPOINT_INTERVAL,
            phase: phase.into(),
            processed: AtomicU64::new(0),
            repository,
            event_bus,
        }
    }

    /// Persist every `interval` checkpoints. Zero is treated as one.
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn progress(&self) -> ReconcileProgress {
        let mut progress = ReconcileProgress::new();
        progress.update(self.processed(), self.total, &self.phase);
        progress
    }

    async fn flush(&self) {
        let progress = self.progress();

        if let Err(e) = self
            .repository
            .update_progress(&self.job_id, &progress)
            .await
        {
            warn!(job_id = %self.job_id, error = %e, "Failed to persist reconcile progress");
        }

        self.event_bus
            .emit(CoreEvent::Reconcile(ReconcileEvent::Progress {
                job_id: self.job_id.to_string(),
                items_processed: progress.items_processed,
                total_items: Some(progress.items_discovered),
                percent: progress.percent,
                phase: progress.phase,
            }))
            .ok();
    }
}

#[async_trait]
impl CheckpointSink for JobCheckpoint {
    async fn checkpoint(&self) {
        let processed = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(job_id = %self.job_id, processed, "Checkpoint");

        if processed % self.interval == 0 || processed == self.total {
            self.flush().await;
        }
    }
}
