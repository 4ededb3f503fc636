//! # Core Configuration Module
//!
//! Provides configuration management for the reconciliation core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the settings and host capabilities the core needs.
//! It enforces fail-fast validation so a misconfigured host finds out at
//! startup rather than halfway through a long reconciliation run.
//!
//! ## Required Settings
//!
//! - `database_path` - SQLite file holding job records and the item map
//!
//! ## Optional Settings
//!
//! - `mapping_path` - JSON file with episode numbering mappings
//! - `event_buffer_size` - Capacity of the event bus (default 100)
//! - `LoggerSink` - Forward logs to the host
//! - `Clock` - Time source (defaults to [`SystemClock`])
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/sync.db")
//!     .mapping_path("/path/to/mappings.json")
//!     .enable_movies(true)
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // No database path: fails with an actionable message
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing database path");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::time::{Clock, LoggerSink, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;

/// Largest event buffer the builder accepts.
const MAX_EVENT_BUFFER_SIZE: usize = 65_536;

/// Core configuration for the reconciliation core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Optional JSON file with episode numbering mappings
    pub mapping_path: Option<PathBuf>,

    /// Capacity of the broadcast event bus
    pub event_buffer_size: usize,

    /// Host logger sink (optional)
    pub logger_sink: Option<Arc<dyn LoggerSink>>,

    /// Time source
    pub clock: Arc<dyn Clock>,

    /// Feature flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("mapping_path", &self.mapping_path)
            .field("event_buffer_size", &self.event_buffer_size)
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .field("clock", &"Clock { ... }")
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Run the movie pass in addition to the show and episode passes
    pub enable_movies: bool,

    /// Persist the item map at the end of every run
    pub persist_item_map: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_movies: false,
            persist_item_map: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - Mapping path, when given, is not empty
    /// - Event buffer size is within bounds
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if let Some(path) = &self.mapping_path {
            if path.as_os_str().is_empty() {
                return Err(Error::Config(
                    "Mapping path cannot be empty when provided".to_string(),
                ));
            }
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        Ok(())
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    mapping_path: Option<PathBuf>,
    event_buffer_size: Option<usize>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    clock: Option<Arc<dyn Clock>>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .database_path("/path/to/sync.db");
    /// ```
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the numbering mappings file.
    pub fn mapping_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.mapping_path = Some(path.into());
        self
    }

    /// Sets the event bus capacity.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Injects a host logger sink.
    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Injects a time source.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Enables or disables the movie pass.
    pub fn enable_movies(mut self, enable: bool) -> Self {
        self.features.enable_movies = enable;
        self
    }

    /// Enables or disables item map persistence.
    pub fn persist_item_map(mut self, enable: bool) -> Self {
        self.features.persist_item_map = enable;
        self
    }

    /// Replaces all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the database path is missing or the
    /// resulting configuration fails [`CoreConfig::validate`].
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config(
                "Database path is required. Call .database_path() with the location \
                 of the reconciliation database."
                    .to_string(),
            )
        })?;

        let config = CoreConfig {
            database_path,
            mapping_path: self.mapping_path,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            logger_sink: self.logger_sink,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            features: self.features,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::time::{ConsoleLogger, FixedClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_builder_requires_database_path() {
        let result = CoreConfig::builder().build();

        assert!(result.is_err());
        match result.unwrap_err() {
            Error::Config(msg) => assert!(msg.contains("Database path is required")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_builder_with_defaults() {
        let config = CoreConfig::builder()
            .database_path("/tmp/sync.db")
            .build()
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/sync.db"));
        assert!(config.mapping_path.is_none());
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert!(config.logger_sink.is_none());
        assert_eq!(config.features, FeatureFlags::default());
    }

    #[test]
    fn test_builder_with_all_fields() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let config = CoreConfig::builder()
            .database_path(PathBuf::from("/tmp/sync.db"))
            .mapping_path("/tmp/mappings.json")
            .event_buffer_size(16)
            .logger_sink(Arc::new(ConsoleLogger::default()))
            .clock(Arc::new(FixedClock::new(start)))
            .enable_movies(true)
            .persist_item_map(false)
            .build()
            .unwrap();

        assert_eq!(
            config.mapping_path,
            Some(PathBuf::from("/tmp/mappings.json"))
        );
        assert_eq!(config.event_buffer_size, 16);
        assert!(config.logger_sink.is_some());
        assert_eq!(config.clock.now(), start);
        assert!(config.features.enable_movies);
        assert!(!config.features.persist_item_map);
    }

    #[test]
    fn test_validate_rejects_empty_database_path() {
        let result = CoreConfig::builder().database_path("").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let result = CoreConfig::builder()
            .database_path("/tmp/sync.db")
            .event_buffer_size(0)
            .build();

        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("greater than 0")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_oversized_buffer() {
        let result = CoreConfig::builder()
            .database_path("/tmp/sync.db")
            .event_buffer_size(MAX_EVENT_BUFFER_SIZE + 1)
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_mapping_path() {
        let result = CoreConfig::builder()
            .database_path("/tmp/sync.db")
            .mapping_path("")
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_feature_flags_default() {
        let flags = FeatureFlags::default();
        assert!(!flags.enable_movies);
        assert!(flags.persist_item_map);
    }

    #[test]
    fn test_builder_replaces_features() {
        let config = CoreConfig::builder()
            .database_path("/tmp/sync.db")
            .features(FeatureFlags {
                enable_movies: true,
                persist_item_map: false,
            })
            .build()
            .unwrap();

        assert!(config.features.enable_movies);
        assert!(!config.features.persist_item_map);
    }

    #[test]
    fn test_config_debug_hides_capabilities() {
        let config = CoreConfig::builder()
            .database_path("/tmp/sync.db")
            .logger_sink(Arc::new(ConsoleLogger::default()))
            .build()
            .unwrap();

        let rendered = format!("{:?}", config);
        assert!(rendered.contains("LoggerSink { ... }"));
        assert!(rendered.contains("Clock { ... }"));
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = CoreConfig::builder()
            .database_path("/tmp/sync.db")
            .build()
            .unwrap();

        let cloned = config.clone();
        assert_eq!(cloned.database_path, config.database_path);
        assert_eq!(cloned.features, config.features);
    }
}
