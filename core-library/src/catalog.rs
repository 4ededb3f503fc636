//! Catalog reader abstraction
//!
//! The reconciliation core never talks to the media server's database
//! directly. It reads sections, shows, seasons, episodes and movies through
//! [`LibraryCatalog`], which the host implements against its own store.

use crate::error::Result;
use crate::models::{
    LibrarySection, LocalEpisode, LocalMovie, LocalSeason, LocalShow, MediaKind, SectionId,
};
use async_trait::async_trait;
use std::collections::HashMap;

/// Options forwarded to every catalog read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    /// Media-server account whose view state should be returned
    pub account: Option<String>,
}

impl CatalogQuery {
    pub fn for_account(account: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
        }
    }
}

/// Sections of one media kind, in catalog order, with a by-id index.
#[derive(Debug, Clone, Default)]
pub struct SectionSet {
    sections: Vec<LibrarySection>,
    by_id: HashMap<SectionId, usize>,
}

impl SectionSet {
    pub fn new(sections: Vec<LibrarySection>) -> Self {
        let by_id = sections
            .iter()
            .enumerate()
            .map(|(index, section)| (section.id, index))
            .collect();

        Self { sections, by_id }
    }

    pub fn get(&self, id: SectionId) -> Option<&LibrarySection> {
        self.by_id.get(&id).map(|&index| &self.sections[index])
    }

    pub fn contains(&self, id: SectionId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = SectionId> + '_ {
        self.sections.iter().map(|section| section.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LibrarySection> {
        self.sections.iter()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Keep only the sections whose id is in `allowed`.
    pub fn retain_allowed(self, allowed: &[SectionId]) -> Self {
        let sections = self
            .sections
            .into_iter()
            .filter(|section| allowed.contains(&section.id))
            .collect();
        Self::new(sections)
    }
}

/// Flattened episode listing for a set of sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeListing {
    pub shows: Vec<LocalShow>,
    pub seasons: Vec<LocalSeason>,
    pub episodes: Vec<LocalEpisode>,
}

impl EpisodeListing {
    pub fn is_empty(&self) -> bool {
        self.shows.is_empty() && self.episodes.is_empty()
    }
}

/// Read access to the local media-server catalog.
///
/// Implementations must be `Send + Sync`; failures are surfaced as
/// [`LibraryError`](crate::error::LibraryError) and are fatal to the
/// reconciliation run that issued the read.
#[async_trait]
pub trait LibraryCatalog: Send + Sync {
    /// Sections holding the given media kind.
    async fn sections(&self, kind: MediaKind) -> Result<SectionSet>;

    /// Shows, seasons and episodes of the given sections.
    async fn episodes(&self, sections: &SectionSet, query: &CatalogQuery)
        -> Result<EpisodeListing>;

    /// Movies of the given sections.
    async fn movies(&self, sections: &SectionSet, query: &CatalogQuery)
        -> Result<Vec<LocalMovie>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sections() -> SectionSet {
        SectionSet::new(vec![
            LibrarySection::new(1, MediaKind::Show, "TV Shows"),
            LibrarySection::new(4, MediaKind::Show, "Anime"),
            LibrarySection::new(7, MediaKind::Show, "Kids"),
        ])
    }

    #[test]
    fn test_section_set_lookup() {
        let set = sections();
        assert_eq!(set.len(), 3);
        assert_eq!(set.get(SectionId(4)).map(|s| s.title.as_str()), Some("Anime"));
        assert!(set.get(SectionId(2)).is_none());
        assert_eq!(
            set.ids().collect::<Vec<_>>(),
            vec![SectionId(1), SectionId(4), SectionId(7)]
        );
    }

    #[test]
    fn test_section_set_allowlist() {
        let set = sections().retain_allowed(&[SectionId(7), SectionId(1), SectionId(99)]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(SectionId(1)));
        assert!(set.contains(SectionId(7)));
        assert!(!set.contains(SectionId(4)));
        assert_eq!(set.get(SectionId(7)).map(|s| s.title.as_str()), Some("Kids"));
    }

    #[test]
    fn test_catalog_query_for_account() {
        let query = CatalogQuery::for_account("1");
        assert_eq!(query.account.as_deref(), Some("1"));
        assert_eq!(CatalogQuery::default().account, None);
    }
}
