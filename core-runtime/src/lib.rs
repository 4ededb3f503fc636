//! Runtime plumbing shared by the reconciliation crates.
//!
//! - [`config`]: the validated [`CoreConfig`] a host hands to the core
//! - [`logging`]: `tracing` subscriber setup and forwarding to a host
//!   [`LoggerSink`](bridge_traits::time::LoggerSink)
//! - [`events`]: the broadcast [`EventBus`] carrying [`ReconcileEvent`]s

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::CoreConfig;
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, ReconcileEvent};
