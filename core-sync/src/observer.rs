//! Run diagnostics
//!
//! The engine reports expected-skip conditions and end-of-run summaries to a
//! [`ReconcileObserver`] it receives at construction. [`TracingObserver`]
//! turns them into `tracing` events.

use crate::error::SyncError;
use crate::guid::RawGuid;
use crate::media::{SyncData, SyncMedia};
use crate::unsupported::UnsupportedSummary;
use core_library::{EpisodeIds, LocalId};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub trait ReconcileObserver: Send + Sync {
    /// A supported identifier did not resolve to a reference.
    fn identifier_not_found(&self, _media: SyncMedia, _owner: LocalId, _guid: &RawGuid) {}

    /// The identifier resolved but produced no remote episode numbering.
    fn numbering_unresolved(&self, _owner: LocalId, _guid: &RawGuid) {}

    /// The episode matched but carries no local episode id.
    fn missing_local_episode_id(&self, _ids: &EpisodeIds) {}

    /// A handler failed and the run continues under the skip policy.
    fn handler_failed(&self, _error: &SyncError) {}

    fn unsupported_summary(&self, _media: SyncMedia, _summary: &UnsupportedSummary) {}

    /// Unresolved remote unit count per data type.
    fn pending_summary(&self, _remaining: &BTreeMap<SyncData, usize>) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ReconcileObserver for TracingObserver {
    fn identifier_not_found(&self, media: SyncMedia, owner: LocalId, guid: &RawGuid) {
        info!(media = %media, rating_key = %owner, "Unable to find identifier for: {}", guid);
    }

    fn numbering_unresolved(&self, owner: LocalId, guid: &RawGuid) {
        warn!(rating_key = %owner, "No episodes returned for: {}", guid);
    }

    fn missing_local_episode_id(&self, ids: &EpisodeIds) {
        debug!(show = %ids.show, "Episode has no local id, skipping");
    }

    fn handler_failed(&self, error: &SyncError) {
        warn!(error = %error, "Handler failed, skipping unit");
    }

    fn unsupported_summary(&self, media: SyncMedia, summary: &UnsupportedSummary) {
        if summary.count == 0 {
            return;
        }
        info!(
            media = %media,
            count = summary.count,
            "Found {} unsupported {}:\n{}",
            summary.count,
            media,
            summary.report.trim_end()
        );
    }

    fn pending_summary(&self, remaining: &BTreeMap<SyncData, usize>) {
        for (data, count) in remaining {
            debug!(data = %data, remaining = count, "Pending remote units");
        }
    }
}
