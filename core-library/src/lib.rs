//! # Library Catalog Module
//!
//! Models the local media-server catalog the reconciliation core reads.
//!
//! ## Overview
//!
//! This module provides:
//! - Domain models for sections, shows, seasons, episodes and movies
//! - The [`LibraryCatalog`] reader trait hosts implement
//! - An in-memory catalog for hosts that already hold the data (and tests)

pub mod catalog;
pub mod error;
pub mod memory;
pub mod models;

pub use catalog::{CatalogQuery, EpisodeListing, LibraryCatalog, SectionSet};
pub use error::{LibraryError, Result};
pub use memory::InMemoryCatalog;
pub use models::{
    EpisodeIds, EpisodeNumber, LibrarySection, LocalEpisode, LocalId, LocalMovie, LocalSeason,
    LocalShow, LocalState, MediaKind, SectionId,
};
