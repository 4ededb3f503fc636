//! # Reconciliation Module
//!
//! Matches the local media-server catalog against a remote catalog and
//! dispatches every matched pair to pluggable synchronization handlers.
//!
//! ## Overview
//!
//! A run walks the local shows, episodes (and optionally movies), resolves
//! each item's agent identifier to a canonical external reference, looks the
//! reference up in the remote key table, and for every active data type
//! hands the local item and its remote counterpart to the bound handlers.
//! Remote units never matched locally are reported as pending.
//!
//! ## Components
//!
//! - **Identifier Parser** (`guid`): agent URIs to external references, with
//!   numbering translation through `mapping`
//! - **Unsupported Aggregator** (`unsupported`): per-owner summary of
//!   identifiers with an unknown agent
//! - **Remote Catalog** (`remote`, `table`): key/pk tables and per data type
//!   show → season → episode trees
//! - **Item Map** (`item_map`) and **Pending Tracker** (`pending`)
//! - **Handler Registry** (`handler`) and **Observer** (`observer`)
//! - **Engine** (`engine`): the show, episode and movie passes
//! - **Reconcile Job State Machine** (`job`) with SQLite persistence
//!   (`db`, `repository`) and progress checkpoints (`checkpoint`)
//! - **Reconcile Coordinator** (`coordinator`): runs jobs end to end

pub mod checkpoint;
pub mod coordinator;
pub mod db;
pub mod engine;
pub mod error;
pub mod guid;
pub mod handler;
pub mod item_map;
pub mod job;
pub mod mapping;
pub mod media;
pub mod observer;
pub mod pending;
pub mod remote;
pub mod repository;
pub mod table;
pub mod unsupported;

pub use checkpoint::{JobCheckpoint, DEFAULT_CHECKPOINT_INTERVAL};
pub use coordinator::{ReconcileConfig, ReconcileCoordinator, ReconcileOutcome};
pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use engine::{ReconcileOptions, ReconcileReport, ReconcileState, ReconcileStats, Reconciler};
pub use error::{Result, SyncError};
pub use guid::{ExternalRef, GuidMatch, GuidParser, RawGuid, Service};
pub use handler::{HandlerFailurePolicy, HandlerRegistry, LocalItem, RemoteItem, SyncHandler};
pub use item_map::{ItemMap, ItemMapEntry};
pub use job::{JobStatus, ReconcileJob, ReconcileJobId, ReconcileProgress};
pub use mapping::{EpisodeOverride, MappingTable, SeriesMapping};
pub use media::{DataSelection, SyncData, SyncMedia};
pub use observer::{ReconcileObserver, TracingObserver};
pub use pending::{PendingKey, PendingTracker};
pub use remote::{RemoteCatalog, RemoteEpisode, RemoteMovie, RemoteSeason, RemoteShow, RemoteState};
pub use repository::{
    ItemMapRepository, ReconcileJobRepository, SqliteItemMapRepository,
    SqliteReconcileJobRepository,
};
pub use table::{KeyTable, Pk, TableName};
pub use unsupported::{UnsupportedAggregator, UnsupportedEntry, UnsupportedSummary};
