//! Media catalog reconciliation core.
//!
//! Re-exports the workspace crates under one roof and provides a bootstrap
//! helper that wires a [`CoreConfig`](core_runtime::config::CoreConfig) into
//! a ready-to-run [`ReconcileCoordinator`](core_sync::ReconcileCoordinator).
//! Host applications supply the catalog reader, the remote catalog snapshot
//! and the synchronization handlers.

pub use bridge_traits;
pub use core_library;
pub use core_runtime;
pub use core_sync;

use std::sync::Arc;

use core_library::LibraryCatalog;
use core_runtime::config::CoreConfig;
use core_runtime::logging::{init_logging, LoggingConfig};
use core_sync::{HandlerRegistry, ReconcileConfig, ReconcileCoordinator};

/// Commonly used types for hosts wiring a reconciliation run.
pub mod prelude {
    pub use bridge_traits::{CheckpointSink, Clock, LoggerSink};
    pub use core_library::{
        EpisodeNumber, InMemoryCatalog, LibraryCatalog, LibrarySection, LocalEpisode, LocalId,
        LocalMovie, LocalShow, MediaKind,
    };
    pub use core_runtime::config::CoreConfig;
    pub use core_runtime::events::{CoreEvent, EventBus, ReconcileEvent};
    pub use core_sync::{
        DataSelection, ExternalRef, HandlerFailurePolicy, HandlerRegistry, LocalItem,
        ReconcileConfig, ReconcileCoordinator, ReconcileOutcome, RemoteCatalog, RemoteItem,
        RemoteShow, RemoteState, Service, SyncData, SyncError, SyncHandler, SyncMedia, TableName,
    };
}

/// Initialise logging (when `logging` is given) and build a coordinator.
///
/// The host logger sink from `core` is attached to the logging layer when
/// the logging configuration does not already carry one.
///
/// # Errors
///
/// Returns an error if logging was already initialised, the configuration
/// is invalid, the database cannot be opened, or the mapping file cannot be
/// read.
pub async fn bootstrap(
    core: &CoreConfig,
    logging: Option<LoggingConfig>,
    config: ReconcileConfig,
    catalog: Arc<dyn LibraryCatalog>,
    handlers: Arc<HandlerRegistry>,
) -> core_sync::Result<ReconcileCoordinator> {
    if let Some(mut logging) = logging {
        if logging.logger_sink.is_none() {
            if let Some(sink) = &core.logger_sink {
                logging = logging.with_logger_sink(Arc::clone(sink));
            }
        }
        init_logging(logging)?;
    }

    ReconcileCoordinator::from_core_config(core, config, catalog, handlers).await
}
