//! Unsupported identifier aggregation
//!
//! Identifiers from agents the parser does not know are expected (local
//! agents, personal media). They are grouped by owning show so one bad
//! show does not produce a log line per episode.

use crate::guid::RawGuid;
use core_library::LocalId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnsupportedEntry {
    /// Distinct service tags seen for this owner
    pub services: BTreeSet<String>,
    /// Number of marked identifiers
    pub occurrences: usize,
}

/// Count plus per-owner detail, ready for an end-of-run log line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnsupportedSummary {
    pub count: usize,
    pub report: String,
}

#[derive(Debug, Clone, Default)]
pub struct UnsupportedAggregator {
    owners: BTreeMap<LocalId, UnsupportedEntry>,
}

impl UnsupportedAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an unsupported identifier under `owner`.
    pub fn mark(&mut self, owner: LocalId, guid: &RawGuid) {
        let entry = self.owners.entry(owner).or_default();
        entry.services.insert(guid.service.clone());
        entry.occurrences += 1;
    }

    /// Number of distinct owners with unsupported identifiers.
    pub fn count(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn get(&self, owner: LocalId) -> Option<&UnsupportedEntry> {
        self.owners.get(&owner)
    }

    pub fn summarize(&self) -> UnsupportedSummary {
        let mut report = String::new();

        for (owner, entry) in &self.owners {
            let services: Vec<&str> = entry.services.iter().map(String::as_str).collect();
            let _ = writeln!(
                report,
                "  {}: {} ({} item{})",
                owner,
                services.join(", "),
                entry.occurrences,
                if entry.occurrences == 1 { "" } else { "s" }
            );
        }

        UnsupportedSummary {
            count: self.count(),
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(service: &str, id: &str) -> RawGuid {
        RawGuid {
            service: service.to_string(),
            id: id.to_string(),
        }
    }

    #[test]
    fn test_empty_summary() {
        let aggregator = UnsupportedAggregator::new();
        let summary = aggregator.summarize();

        assert_eq!(summary.count, 0);
        assert!(summary.report.is_empty());
    }

    #[test]
    fn test_groups_by_owner() {
        let mut aggregator = UnsupportedAggregator::new();
        aggregator.mark(LocalId(42), &raw("foo", "5"));
        aggregator.mark(LocalId(42), &raw("foo", "5"));
        aggregator.mark(LocalId(42), &raw("local", "9"));
        aggregator.mark(LocalId(7), &raw("foo", "1"));

        assert_eq!(aggregator.count(), 2);

        let entry = aggregator.get(LocalId(42)).unwrap();
        assert_eq!(entry.occurrences, 3);
        assert_eq!(entry.services.len(), 2);

        let summary = aggregator.summarize();
        assert_eq!(summary.count, 2);
        assert_eq!(
            summary.report,
            "  7: foo (1 item)\n  42: foo, local (3 items)\n"
        );
    }
}
