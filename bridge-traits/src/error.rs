//! Errors surfaced by host bridge implementations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The host did not wire an implementation for this capability.
    #[error("Host capability unavailable: {0}")]
    Unavailable(String),

    /// A log sink refused or dropped an entry.
    #[error("Log sink rejected entry: {0}")]
    SinkRejected(String),

    /// The host's catalog backend (media server database, API) failed.
    #[error("Host backend failure: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::Backend(_) | BridgeError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
