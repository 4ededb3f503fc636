//! # Reconcile Repositories
//!
//! Database persistence for reconciliation jobs and the item map.
//!
//! ## Overview
//!
//! - [`ReconcileJobRepository`]: job records, progress updates, history and
//!   the "is a run active" query used by the coordinator
//! - [`ItemMapRepository`]: the item map produced by the last run of each
//!   media kind, replaced wholesale on save

use crate::engine::ReconcileStats;
use crate::guid::ExternalRef;
use crate::item_map::{ItemMap, ItemMapEntry};
use crate::job::{JobStatus, ReconcileJob, ReconcileJobId, ReconcileProgress};
use crate::table::Pk;
use crate::{Result, SyncError};
use async_trait::async_trait;
use core_library::{LocalId, MediaKind, SectionId};
use sqlx::{FromRow, SqlitePool};

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait ReconcileJobRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn insert(&self, job: &ReconcileJob) -> Result<()>;

    /// Persist status, progress, stats and timestamps of an existing job
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::JobNotFound`] if the job doesn't exist
    async fn update(&self, job: &ReconcileJob) -> Result<()>;

    /// Persist only the progress columns
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::JobNotFound`] if the job doesn't exist
    async fn update_progress(&self, id: &ReconcileJobId, progress: &ReconcileProgress)
        -> Result<()>;

    async fn find_by_id(&self, id: &ReconcileJobId) -> Result<Option<ReconcileJob>>;

    /// Most recent job for a media kind
    async fn find_latest(&self, kind: MediaKind) -> Result<Option<ReconcileJob>>;

    /// Jobs for a media kind, most recent first
    async fn get_history(&self, kind: MediaKind, limit: u32) -> Result<Vec<ReconcileJob>>;

    /// Whether a pending or running job exists for a media kind
    async fn has_active(&self, kind: MediaKind) -> Result<bool>;
}

#[async_trait]
pub trait ItemMapRepository: Send + Sync {
    /// Replace the stored map for `kind` with `map`, stamping every row
    /// with `updated_at` (unix seconds)
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; the previous map
    /// is kept in that case
    async fn save(&self, kind: MediaKind, map: &ItemMap, updated_at: i64) -> Result<()>;

    /// Load the stored map for `kind` (empty if none was saved)
    async fn load(&self, kind: MediaKind) -> Result<ItemMap>;
}

// ============================================================================
// SQLite Implementations
// ============================================================================

pub struct SqliteReconcileJobRepository {
    pool: SqlitePool,
}

impl SqliteReconcileJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ReconcileJobRow {
    id: String,
    media_kind: String,
    status: String,
    items_discovered: i64,
    items_processed: i64,
    phase: String,
    stats: Option<String>,
    error_message: Option<String>,
    started_at: Option<i64>,
    completed_at: Option<i64>,
    created_at: i64,
}

const JOB_COLUMNS: &str = "id, media_kind, status, items_discovered, items_processed, phase, \
     stats, error_message, started_at, completed_at, created_at";

impl TryFrom<ReconcileJobRow> for ReconcileJob {
    type Error = SyncError;

    fn try_from(row: ReconcileJobRow) -> Result<Self> {
        let media_kind: MediaKind = row
            .media_kind
            .parse()
            .map_err(SyncError::InvalidMediaKind)?;
        let status: JobStatus = row.status.parse()?;

        let mut progress = ReconcileProgress::new();
        progress.update(
            row.items_processed.max(0) as u64,
            row.items_discovered.max(0) as u64,
            &row.phase,
        );
        if status == JobStatus::Completed {
            progress.percent = 100;
        }

        let stats = row
            .stats
            .as_deref()
            .map(serde_json::from_str::<ReconcileStats>)
            .transpose()
            .map_err(|e| SyncError::Database(format!("Invalid stats column: {}", e)))?;

        Ok(ReconcileJob {
            id: ReconcileJobId::from_string(&row.id)?,
            media_kind,
            status,
            progress,
            stats,
            error_message: row.error_message,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

fn encode_stats(stats: Option<&ReconcileStats>) -> Result<Option<String>> {
    stats
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| SyncError::Database(e.to_string()))
}

#[async_trait]
impl ReconcileJobRepository for SqliteReconcileJobRepository {
    async fn insert(&self, job: &ReconcileJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reconcile_jobs (
                id, media_kind, status, items_discovered, items_processed, phase,
                stats, error_message, started_at, completed_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id.as_str())
        .bind(job.media_kind.as_str())
        .bind(job.status.as_str())
        .bind(job.progress.items_discovered as i64)
        .bind(job.progress.items_processed as i64)
        .bind(&job.progress.phase)
        .bind(encode_stats(job.stats.as_ref())?)
        .bind(&job.error_message)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(())
    }

    async fn update(&self, job: &ReconcileJob) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE reconcile_jobs SET
                status = ?,
                items_discovered = ?,
                items_processed = ?,
                phase = ?,
                stats = ?,
                error_message = ?,
                started_at = ?,
                completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(job.status.as_str())
        .bind(job.progress.items_discovered as i64)
        .bind(job.progress.items_processed as i64)
        .bind(&job.progress.phase)
        .bind(encode_stats(job.stats.as_ref())?)
        .bind(&job.error_message)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(SyncError::JobNotFound {
                job_id: job.id.to_string(),
            });
        }

        Ok(())
    }

    async fn update_progress(
        &self,
        id: &ReconcileJobId,
        progress: &ReconcileProgress,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE reconcile_jobs SET
                items_discovered = ?,
                items_processed = ?,
                phase = ?
            WHERE id = ?
            "#,
        )
        .bind(progress.items_discovered as i64)
        .bind(progress.items_processed as i64)
        .bind(&progress.phase)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(SyncError::JobNotFound {
                job_id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &ReconcileJobId) -> Result<Option<ReconcileJob>> {
        let row = sqlx::query_as::<_, ReconcileJobRow>(&format!(
            "SELECT {} FROM reconcile_jobs WHERE id = ?",
            JOB_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        row.map(ReconcileJob::try_from).transpose()
    }

    async fn find_latest(&self, kind: MediaKind) -> Result<Option<ReconcileJob>> {
        let row = sqlx::query_as::<_, ReconcileJobRow>(&format!(
            "SELECT {} FROM reconcile_jobs WHERE media_kind = ? \
             ORDER BY created_at DESC, rowid DESC LIMIT 1",
            JOB_COLUMNS
        ))
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        row.map(ReconcileJob::try_from).transpose()
    }

    async fn get_history(&self, kind: MediaKind, limit: u32) -> Result<Vec<ReconcileJob>> {
        let rows = sqlx::query_as::<_, ReconcileJobRow>(&format!(
            "SELECT {} FROM reconcile_jobs WHERE media_kind = ? \
             ORDER BY created_at DESC, rowid DESC LIMIT ?",
            JOB_COLUMNS
        ))
        .bind(kind.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        rows.into_iter()
            .map(ReconcileJob::try_from)
            .collect::<Result<Vec<_>>>()
    }

    async fn has_active(&self, kind: MediaKind) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM reconcile_jobs
            WHERE media_kind = ? AND status IN ('pending', 'running')
            "#,
        )
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(count > 0)
    }
}

pub struct SqliteItemMapRepository {
    pool: SqlitePool,
}

impl SqliteItemMapRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ItemMapRow {
    local_id: i64,
    section_id: i64,
    reference: String,
    pk: Option<String>,
}

impl ItemMapRow {
    fn into_entry(self) -> Result<(LocalId, ItemMapEntry)> {
        let key: ExternalRef = self.reference.parse()?;
        Ok((
            LocalId(self.local_id),
            ItemMapEntry {
                section: SectionId(self.section_id),
                key,
                pk: self.pk.map(Pk::new),
            },
        ))
    }
}

#[async_trait]
impl ItemMapRepository for SqliteItemMapRepository {
    async fn save(&self, kind: MediaKind, map: &ItemMap, updated_at: i64) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        sqlx::query("DELETE FROM item_map WHERE media_kind = ?")
            .bind(kind.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        for (local_id, entry) in map.iter() {
            sqlx::query(
                r#"
                INSERT INTO item_map (media_kind, local_id, section_id, reference, pk, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(kind.as_str())
            .bind(local_id.0)
            .bind(entry.section.0)
            .bind(entry.key.to_string())
            .bind(entry.pk.as_ref().map(Pk::as_str))
            .bind(updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(())
    }

    async fn load(&self, kind: MediaKind) -> Result<ItemMap> {
        let rows = sqlx::query_as::<_, ItemMapRow>(
            r#"
            SELECT local_id, section_id, reference, pk
            FROM item_map
            WHERE media_kind = ?
            "#,
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        rows.into_iter()
            .map(ItemMapRow::into_entry)
            .collect::<Result<ItemMap>>()
    }
}

// ============================================================================
// Tests
// ============================================================================
