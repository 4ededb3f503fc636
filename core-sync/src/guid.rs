//! Identifier parser
//!
//! Turns the media server's raw agent identifiers into service-qualified
//! references, e.g. `com.plexapp.agents.thetvdb://81189/1/3?lang=en` into
//! `tvdb:81189`. When an episode hint is supplied, the local numbering is
//! translated into the remote numbering through the [`MappingTable`].

use crate::error::SyncError;
use crate::mapping::MappingTable;
use core_library::EpisodeNumber;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// External metadata service a reference belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Tvdb,
    Imdb,
    Tmdb,
    Tvrage,
    Anidb,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Tvdb => "tvdb",
            Service::Imdb => "imdb",
            Service::Tmdb => "tmdb",
            Service::Tvrage => "tvrage",
            Service::Anidb => "anidb",
        }
    }

    /// Services the remote catalog does not index directly.
    pub fn requires_mapping(&self) -> bool {
        matches!(self, Service::Anidb)
    }

    fn is_valid_id(&self, id: &str) -> bool {
        match self {
            Service::Imdb => id
                .strip_prefix("tt")
                .map(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
                .unwrap_or(false),
            _ => !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()),
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tvdb" => Ok(Service::Tvdb),
            "imdb" => Ok(Service::Imdb),
            "tmdb" => Ok(Service::Tmdb),
            "tvrage" => Ok(Service::Tvrage),
            "anidb" => Ok(Service::Anidb),
            other => Err(SyncError::Mapping(format!("Unknown service: {}", other))),
        }
    }
}

/// Canonical `(service, id)` key of a media unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExternalRef {
    pub service: Service,
    pub id: String,
}

impl ExternalRef {
    pub fn new(service: Service, id: impl Into<String>) -> Self {
        Self {
            service,
            id: id.into(),
        }
    }
}

impl fmt::Display for ExternalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.service, self.id)
    }
}

impl FromStr for ExternalRef {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (service, id) = s
            .split_once(':')
            .ok_or_else(|| SyncError::Mapping(format!("Expected <service>:<id>, got {:?}", s)))?;
        let service: Service = service.parse()?;

        if !service.is_valid_id(id) {
            return Err(SyncError::Mapping(format!(
                "Invalid {} identifier: {:?}",
                service, id
            )));
        }

        Ok(Self::new(service, id))
    }
}

impl TryFrom<String> for ExternalRef {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExternalRef> for String {
    fn from(value: ExternalRef) -> Self {
        value.to_string()
    }
}

/// The identifier split into its raw parts, kept for log lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawGuid {
    /// Agent or service tag as written in the identifier
    pub service: String,
    /// Service-local id as written in the identifier
    pub id: String,
}

impl fmt::Display for RawGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.id)
    }
}

/// Outcome of parsing one identifier.
///
/// `found` implies `supported`; `reference` is set exactly when `found`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuidMatch {
    pub supported: bool,
    pub found: bool,
    pub reference: Option<ExternalRef>,
    /// Remote `(season, episode)` pairs in resolution order. Only the first
    /// one is authoritative.
    pub episodes: Vec<EpisodeNumber>,
    pub raw: RawGuid,
}

impl GuidMatch {
    fn unsupported(raw: RawGuid) -> Self {
        Self {
            supported: false,
            found: false,
            reference: None,
            episodes: Vec::new(),
            raw,
        }
    }

    fn not_found(raw: RawGuid) -> Self {
        Self {
            supported: true,
            found: false,
            reference: None,
            episodes: Vec::new(),
            raw,
        }
    }

    fn found(raw: RawGuid, reference: ExternalRef, episodes: Vec<EpisodeNumber>) -> Self {
        Self {
            supported: true,
            found: true,
            reference: Some(reference),
            episodes,
            raw,
        }
    }

    /// First resolved `(season, episode)` pair.
    pub fn first_episode(&self) -> Option<EpisodeNumber> {
        self.episodes.first().copied()
    }
}

enum AgentService {
    Direct(Service),
    /// The service is encoded as an id prefix (`anidb-123`).
    Prefixed,
}

fn agent_service(agent: &str) -> Option<AgentService> {
    let service = match agent {
        "tvdb" | "thetvdb" | "com.plexapp.agents.thetvdb" => Service::Tvdb,
        "imdb" | "com.plexapp.agents.imdb" => Service::Imdb,
        "tmdb" | "themoviedb" | "com.plexapp.agents.themoviedb" => Service::Tmdb,
        "tvrage" => Service::Tvrage,
        "anidb" => Service::Anidb,
        "hama" | "com.plexapp.agents.hama" => return Some(AgentService::Prefixed),
        _ => return None,
    };
    Some(AgentService::Direct(service))
}

fn prefixed_service(prefix: &str) -> Option<Service> {
    match prefix {
        "anidb" => Some(Service::Anidb),
        "tvdb" | "tvdb2" | "tvdb3" | "tvdb4" | "tvdb5" | "tvdb6" => Some(Service::Tvdb),
        _ => None,
    }
}

/// Parses raw identifiers against a fixed set of numbering mappings.
#[derive(Debug, Clone, Default)]
pub struct GuidParser {
    mappings: Arc<MappingTable>,
}

impl GuidParser {
    pub fn new(mappings: Arc<MappingTable>) -> Self {
        Self { mappings }
    }

    pub fn mappings(&self) -> &MappingTable {
        &self.mappings
    }

    /// Parse `guid`, translating `hint` into remote numbering when given.
    pub fn parse(&self, guid: &str, hint: Option<EpisodeNumber>) -> GuidMatch {
        let Some((agent, rest)) = guid.split_once("://") else {
            return GuidMatch::unsupported(RawGuid {
                service: String::new(),
                id: guid.to_string(),
            });
        };

        let rest = rest.split_once('?').map_or(rest, |(path, _)| path);
        let id = rest.split('/').next().unwrap_or_default();

        let mut raw = RawGuid {
            service: agent.to_string(),
            id: id.to_string(),
        };

        let service = match agent_service(agent) {
            None => return GuidMatch::unsupported(raw),
            Some(AgentService::Direct(service)) => service,
            Some(AgentService::Prefixed) => {
                let Some((prefix, local_id)) = id.split_once('-') else {
                    return GuidMatch::not_found(raw);
                };
                raw.service = prefix.to_string();
                raw.id = local_id.to_string();
                match prefixed_service(prefix) {
                    Some(service) => service,
                    None => return GuidMatch::unsupported(raw),
                }
            }
        };

        if !service.is_valid_id(&raw.id) {
            return GuidMatch::not_found(raw);
        }

        let source = ExternalRef::new(service, raw.id.clone());

        match self.mappings.resolve(&source, hint) {
            Some((target, episodes)) => GuidMatch::found(raw, target, episodes),
            None if service.requires_mapping() => GuidMatch::not_found(raw),
            None => {
                let episodes = hint.map(|number| vec![number]).unwrap_or_default();
                GuidMatch::found(raw, source, episodes)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{EpisodeOverride, SeriesMapping};

    fn parser() -> GuidParser {
        let mut table = MappingTable::default();
        table
            .insert(SeriesMapping {
                source: ExternalRef::new(Service::Anidb, "23"),
                target: ExternalRef::new(Service::Tvdb, "76885"),
                default_season: Some(1),
                episode_offset: 0,
                overrides: vec![EpisodeOverride {
                    from: EpisodeNumber::new(1, 26),
                    to: vec![EpisodeNumber::new(0, 1), EpisodeNumber::new(0, 2)],
                }],
            })
            .unwrap();
        GuidParser::new(Arc::new(table))
    }

    #[test]
    fn test_parse_direct_agents() {
        let parser = GuidParser::default();

        let result = parser.parse("com.plexapp.agents.thetvdb://81189?lang=en", None);
        assert!(result.supported && result.found);
        assert_eq!(result.reference, Some(ExternalRef::new(Service::Tvdb, "81189")));
        assert!(result.episodes.is_empty());

        let result = parser.parse("imdb://tt0113277", None);
        assert_eq!(result.reference, Some(ExternalRef::new(Service::Imdb, "tt0113277")));

        let result = parser.parse("themoviedb://949", None);
        assert_eq!(result.reference, Some(ExternalRef::new(Service::Tmdb, "949")));
    }

    #[test]
    fn test_parse_unsupported_agent() {
        let parser = GuidParser::default();

        let result = parser.parse("foo://5", None);
        assert!(!result.supported);
        assert!(!result.found);
        assert_eq!(result.raw.to_string(), "foo/5");

        let result = parser.parse("local://42", None);
        assert!(!result.supported);

        let result = parser.parse("no-scheme-at-all", None);
        assert!(!result.supported);
    }

    #[test]
    fn test_parse_invalid_id_is_not_found() {
        let parser = GuidParser::default();

        for guid in ["tvdb://", "tvdb://abc", "imdb://0113277", "imdb://tt", "tmdb://12x"] {
            let result = parser.parse(guid, None);
            assert!(result.supported, "{guid} should be supported");
            assert!(!result.found, "{guid} should not be found");
            assert!(result.reference.is_none());
        }
    }

    #[test]
    fn test_parse_identity_numbering() {
        let parser = GuidParser::default();
        let result = parser.parse("tvdb://100/1/1", Some(EpisodeNumber::new(1, 1)));

        assert!(result.found);
        assert_eq!(result.reference, Some(ExternalRef::new(Service::Tvdb, "100")));
        assert_eq!(result.episodes, vec![EpisodeNumber::new(1, 1)]);
    }

    #[test]
    fn test_parse_hama_prefixes() {
        let parser = parser();

        let result = parser.parse("com.plexapp.agents.hama://tvdb3-81189", None);
        assert_eq!(result.reference, Some(ExternalRef::new(Service::Tvdb, "81189")));
        assert_eq!(result.raw.service, "tvdb3");

        let result = parser.parse("hama://unknown-5", None);
        assert!(!result.supported);

        let result = parser.parse("hama://23", None);
        assert!(result.supported);
        assert!(!result.found);
    }

    #[test]
    fn test_parse_anidb_requires_mapping() {
        let parser = parser();

        let unmapped = parser.parse("hama://anidb-99", Some(EpisodeNumber::new(1, 1)));
        assert!(unmapped.supported);
        assert!(!unmapped.found);

        let mapped = parser.parse("hama://anidb-23", Some(EpisodeNumber::new(1, 5)));
        assert!(mapped.found);
        assert_eq!(mapped.reference, Some(ExternalRef::new(Service::Tvdb, "76885")));
        assert_eq!(mapped.episodes, vec![EpisodeNumber::new(1, 5)]);
    }

    #[test]
    fn test_parse_override_preserves_order() {
        let parser = parser();
        let result = parser.parse("anidb://23", Some(EpisodeNumber::new(1, 26)));

        assert_eq!(
            result.episodes,
            vec![EpisodeNumber::new(0, 1), EpisodeNumber::new(0, 2)]
        );
        assert_eq!(result.first_episode(), Some(EpisodeNumber::new(0, 1)));
    }

    #[test]
    fn test_found_implies_supported() {
        let parser = parser();
        for guid in [
            "tvdb://1",
            "foo://1",
            "hama://anidb-99",
            "imdb://tt1",
            "hama://tvdb-x",
            "",
        ] {
            let result = parser.parse(guid, Some(EpisodeNumber::new(1, 1)));
            assert!(!result.found || result.supported);
            assert_eq!(result.found, result.reference.is_some());
        }
    }

    #[test]
    fn test_external_ref_string_form() {
        let reference: ExternalRef = "tvdb:100".parse().unwrap();
        assert_eq!(reference, ExternalRef::new(Service::Tvdb, "100"));
        assert_eq!(reference.to_string(), "tvdb:100");

        assert!("tvdb100".parse::<ExternalRef>().is_err());
        assert!("foo:100".parse::<ExternalRef>().is_err());
        assert!("imdb:100".parse::<ExternalRef>().is_err());
    }
}
