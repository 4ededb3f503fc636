use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or incomplete core configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The log filter directive could not be parsed.
    #[error("Invalid log filter: {0}")]
    LogFilter(String),

    /// A global tracing subscriber is already installed.
    #[error("Logging already initialized: {0}")]
    LoggingInit(String),
}

pub type Result<T> = std::result::Result<T, Error>;
