//! # Reconcile Job State Machine
//!
//! Manages the lifecycle of reconciliation jobs with validated state
//! transitions.
//!
//! ## State Machine
//!
//! ```text
//! Pending → Running → Completed
//!     ↓         ↓
//!     └──────→ Failed
//!     └──────→ Cancelled
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{ReconcileJob, ReconcileStats};
//! use core_library::MediaKind;
//!
//! let mut job = ReconcileJob::new(MediaKind::Show).start()?;
//! job.update_progress(50, 100, "Reconciling episodes")?;
//! let job = job.complete(ReconcileStats::default())?;
//! ```

use crate::engine::ReconcileStats;
use crate::{Result, SyncError};
use bridge_traits::time::Clock;
use chrono::Utc;
use core_library::MediaKind;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a reconcile job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReconcileJobId(Uuid);

impl ReconcileJobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a job ID from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Ok(Self(
            Uuid::parse_str(s).map_err(|e| SyncError::InvalidJobId(e.to_string()))?,
        ))
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ReconcileJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReconcileJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created but not yet started
    Pending,
    Running,
    Completed,
    Failed,
    /// Stopped at a checkpoint on request
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for JobStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(SyncError::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Progress Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileProgress {
    /// Local items the current pass will walk
    pub items_discovered: u64,
    pub items_processed: u64,
    /// Progress percentage (0-100)
    pub percent: u8,
    pub phase: String,
}

impl ReconcileProgress {
    pub fn new() -> Self {
        Self {
            items_discovered: 0,
            items_processed: 0,
            percent: 0,
            phase: "Initializing".to_string(),
        }
    }

    pub fn update(&mut self, items_processed: u64, items_discovered: u64, phase: &str) {
        self.items_processed = items_processed;
        self.items_discovered = items_discovered;
        self.phase = phase.to_string();

        self.percent = if items_discovered > 0 {
            ((items_processed as f64 / items_discovered as f64) * 100.0).min(100.0) as u8
        } else {
            0
        };
    }
}

impl Default for ReconcileProgress {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Job Entity
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileJob {
    pub id: ReconcileJobId,
    pub media_kind: MediaKind,
    pub status: JobStatus,
    pub progress: ReconcileProgress,
    /// Only set once completed
    pub stats: Option<ReconcileStats>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl ReconcileJob {
    /// Create a new job in pending state
    pub fn new(media_kind: MediaKind) -> Self {
        Self {
            id: ReconcileJobId::new(),
            media_kind,
            status: JobStatus::Pending,
            progress: ReconcileProgress::new(),
            stats: None,
            error_message: None,
            created_at: current_timestamp(),
            started_at: None,
            completed_at: None,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the job is not in `Pending` state
    pub fn start(mut self) -> Result<Self> {
        self.validate_transition(JobStatus::Running)?;
        self.status = JobStatus::Running;
        self.started_at = Some(current_timestamp());
        self.progress.phase = "Loading catalog".to_string();
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns an error if the job is not in `Running` state
    pub fn update_progress(
        &mut self,
        items_processed: u64,
        items_discovered: u64,
        phase: &str,
    ) -> Result<()> {
        if self.status != JobStatus::Running {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: "update_progress".to_string(),
                reason: "Job must be running to update progress".to_string(),
            });
        }

        self.progress
            .update(items_processed, items_discovered, phase);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the job is not in `Running` state
    pub fn complete(mut self, stats: ReconcileStats) -> Result<Self> {
        self.validate_transition(JobStatus::Completed)?;
        self.status = JobStatus::Completed;
        self.completed_at = Some(current_timestamp());
        self.stats = Some(stats);
        self.progress.percent = 100;
        self.progress.phase = "Completed".to_string();
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns an error if the job is already in a terminal state
    pub fn fail(mut self, error_message: String) -> Result<Self> {
        self.validate_transition(JobStatus::Failed)?;
        self.status = JobStatus::Failed;
        self.completed_at = Some(current_timestamp());
        self.error_message = Some(error_message);
        self.progress.phase = "Failed".to_string();
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns an error if the job is already in a terminal state
    pub fn cancel(mut self) -> Result<Self> {
        self.validate_transition(JobStatus::Cancelled)?;
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(current_timestamp());
        self.progress.phase = "Cancelled".to_string();
        Ok(self)
    }

    /// Re-stamp the latest transition with `clock`'s time.
    ///
    /// Pending jobs get `created_at`, running jobs `started_at`, terminal
    /// jobs `completed_at`.
    pub fn stamped(mut self, clock: &dyn Clock) -> Self {
        let now = clock.unix_timestamp();
        match self.status {
            JobStatus::Pending => self.created_at = now,
            JobStatus::Running => self.started_at = Some(now),
            _ => self.completed_at = Some(now),
        }
        self
    }

    /// Returns None if the job hasn't started or completed yet
    pub fn duration_secs(&self) -> Option<u64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).max(0) as u64),
            _ => None,
        }
    }

    fn validate_transition(&self, to: JobStatus) -> Result<()> {
        let valid = matches!(
            (self.status, to),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Cancelled)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Cancelled)
        );

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!(
                    "Cannot transition from {} to {}",
                    self.status.as_str(),
                    to.as_str()
                ),
            });
        }

        Ok(())
    }
}

fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

// ============================================================================
// Tests
// ============================================================================
