//! # Event Bus System
//!
//! Provides an event-driven surface for reconciliation runs using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchy for run lifecycle events
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, ReconcileEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Reconcile(ReconcileEvent::Started {
//!         job_id: "job-1".to_string(),
//!         media_kind: "show".to_string(),
//!     }))
//!     .ok();
//!
//! assert!(subscriber.try_recv().is_ok());
//! ```
//!
//! ## Reconcile Events
//! - `Started`: Run initiated for a media kind
//! - `Progress`: Emitted from the checkpoint sink as episodes are processed
//! - `DriftDetected`: Remote units not observed locally, per data type
//! - `Completed`: Run finished successfully
//! - `Failed`: Run aborted by a collaborator or handler failure
//! - `Cancelled`: Run cancelled at a checkpoint
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Reconciliation run lifecycle events
    Reconcile(ReconcileEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Reconcile(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Reconcile(ReconcileEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Reconcile(ReconcileEvent::DriftDetected { .. }) => EventSeverity::Warning,
            CoreEvent::Reconcile(ReconcileEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Reconcile(ReconcileEvent::Cancelled { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Reconcile Events
// ============================================================================

/// Events related to a reconciliation run between the local and remote catalogs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ReconcileEvent {
    /// Run initiated.
    Started {
        /// Unique identifier for this run's job.
        job_id: String,
        /// Media kind being reconciled ("show", "movie").
        media_kind: String,
    },
    /// Progress update, emitted at persisted checkpoints.
    Progress {
        /// The job ID.
        job_id: String,
        /// Number of local units processed so far.
        items_processed: u64,
        /// Total local units in this pass.
        total_items: Option<u64>,
        /// Progress percentage (0-100).
        percent: u8,
        /// Current phase (e.g., "Reconciling episodes").
        phase: String,
    },
    /// Remote units were not observed locally for a data type.
    DriftDetected {
        /// The job ID.
        job_id: String,
        /// Data type name ("watched", "ratings", ...).
        data_type: String,
        /// Number of remote units left unresolved.
        unresolved: u64,
    },
    /// Run finished successfully.
    Completed {
        /// The job ID.
        job_id: String,
        /// Local units processed.
        items_processed: u64,
        /// Handler dispatches performed.
        dispatched: u64,
        /// Units skipped for any expected reason.
        skipped: u64,
        /// Duration of the run in seconds.
        duration_secs: u64,
    },
    /// Run stopped with an error.
    Failed {
        /// The job ID.
        job_id: String,
        /// Human-readable error message.
        message: String,
        /// Number of units processed before failure.
        items_processed: u64,
    },
    /// Run was cancelled at a checkpoint.
    Cancelled {
        /// The job ID.
        job_id: String,
        /// Number of units processed before cancellation.
        items_processed: u64,
    },
}

impl ReconcileEvent {
    fn description(&self) -> &str {
        match self {
            ReconcileEvent::Started { .. } => "Reconciliation started",
            ReconcileEvent::Progress { .. } => "Reconciliation in progress",
            ReconcileEvent::DriftDetected { .. } => "Remote items missing locally",
            ReconcileEvent::Completed { .. } => "Reconciliation completed successfully",
            ReconcileEvent::Failed { .. } => "Reconciliation failed",
            ReconcileEvent::Cancelled { .. } => "Reconciliation cancelled",
        }
    }

    /// Job this event belongs to.
    pub fn job_id(&self) -> &str {
        match self {
            ReconcileEvent::Started { job_id, .. }
            | ReconcileEvent::Progress { job_id, .. }
            | ReconcileEvent::DriftDetected { job_id, .. }
            | ReconcileEvent::Completed { job_id, .. }
            | ReconcileEvent::Failed { job_id, .. }
            | ReconcileEvent::Cancelled { job_id, .. } => job_id,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for core events.
///
/// Cloning the bus is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream, ReconcileEvent};
///
/// let event_bus = EventBus::new(100);
/// let progress_only = EventStream::new(event_bus.subscribe()).filter(|event| {
///     matches!(event, CoreEvent::Reconcile(ReconcileEvent::Progress { .. }))
/// });
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
