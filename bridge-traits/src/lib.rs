//! # Host Bridge Traits
//!
//! Capability traits the reconciliation core consumes but never implements
//! for a concrete host.
//!
//! ## Overview
//!
//! The core reconciles a local media-server catalog against a remote
//! tracking-service catalog. Everything that depends on where the core is
//! embedded (how logs leave the process, what "now" means, what happens when
//! a long pass reaches a checkpoint) is expressed here as a trait so the host
//! can inject its own implementation.
//!
//! ## Traits
//!
//! ### Progress
//! - [`CheckpointSink`](checkpoint::CheckpointSink) - Cooperative
//!   progress/interruption boundary called between episode-level iterations
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type for
//! consistent error handling. Implementations should convert their own errors
//! into `BridgeError` and keep messages actionable.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single implementation can be
//! shared across async tasks behind an `Arc`.

pub mod checkpoint;
pub mod error;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use checkpoint::{CheckpointSink, NoopCheckpoint};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
