use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Reconcile job {job_id} not found")]
    JobNotFound { job_id: String },

    #[error("Reconciliation already in progress for {media_kind}")]
    SyncInProgress { media_kind: String },

    #[error("Catalog error: {0}")]
    Catalog(#[from] LibraryError),

    #[error("Handler for {media}/{data} failed on item {key}: {source}")]
    Handler {
        media: String,
        data: String,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Reconciliation cancelled")]
    Cancelled,

    #[error("Invalid job ID: {0}")]
    InvalidJobId(String),

    #[error("Invalid job status: {0}")]
    InvalidStatus(String),

    #[error("Invalid media kind: {0}")]
    InvalidMediaKind(String),

    #[error("Invalid data type: {0}")]
    InvalidDataType(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Invalid numbering mapping: {0}")]
    Mapping(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<core_runtime::Error> for SyncError {
    fn from(err: core_runtime::Error) -> Self {
        SyncError::Runtime(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
