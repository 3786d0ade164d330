//! Finder chain: resolves a provider track to a library track.
//!
//! Finders run in a fixed order (cache, manual override, cross-reference,
//! structural or legacy search) and the first hit wins. Hits from anything
//! but the cache are written back to the cache under the current policy.

pub mod cache;
pub mod cross_reference;
pub mod legacy;
pub mod manual;
pub mod structural;

use log::{info, warn};
use serde::Serialize;

use crate::cache::TrackIdentityCache;
use crate::comparison::MatchTier;
use crate::criteria::MatchCriteria;
use crate::library::Library;
use crate::manual_map::ManualMap;
use crate::models::{LibraryTrack, ProviderTrack, ProviderTrackKey};
use crate::policy::MatchingPolicy;
use crate::store::MatchStore;

pub use self::cache::CacheFinder;
pub use self::cross_reference::CrossReferenceFinder;
pub use self::legacy::LegacySearchFinder;
pub use self::manual::ManualOverrideFinder;
pub use self::structural::StructuralSearchFinder;

// ============================================================================
// Finder Contract
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinderKind {
    Cache,
    ManualOverride,
    CrossReference,
    StructuralSearch,
    LegacySearch,
}

/// Outcome of one lookup. `failed_criteria` names the fields that defeated
/// rejected candidates and is empty whenever a track was found.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resolution {
    pub track: Option<LibraryTrack>,
    pub failed_criteria: MatchCriteria,
    pub source: Option<FinderKind>,
}

impl Resolution {
    pub fn miss(failed_criteria: MatchCriteria) -> Self {
        Self {
            track: None,
            failed_criteria,
            source: None,
        }
    }

    pub fn found(track: LibraryTrack, source: FinderKind) -> Self {
        Self {
            track: Some(track),
            failed_criteria: MatchCriteria::NONE,
            source: Some(source),
        }
    }

    pub fn is_found(&self) -> bool {
        self.track.is_some()
    }
}

pub trait TrackFinder {
    fn kind(&self) -> FinderKind;

    fn is_enabled(&self) -> bool;

    /// Look up a library track. A miss is a normal outcome, not an error.
    fn find_track(&self, provider_id: &str, track: &ProviderTrack) -> Resolution;
}

// ============================================================================
// Candidate ranking
// ============================================================================

/// A library track that passed every required field.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub priority: u32,
    pub tier: MatchTier,
    pub track: LibraryTrack,
}

/// Lowest `(priority, tier)` wins; among equals the first one found.
pub fn best_candidate(candidates: Vec<Candidate>) -> Option<Candidate> {
    candidates
        .into_iter()
        .min_by_key(|c| (c.priority, c.tier))
}

// ============================================================================
// Chain
// ============================================================================

pub struct FinderChain<'a> {
    policy: MatchingPolicy,
    finders: Vec<Box<dyn TrackFinder + 'a>>,
    cache: TrackIdentityCache<'a>,
}

impl<'a> FinderChain<'a> {
    /// The standard chain for a policy.
    pub fn new(
        policy: &MatchingPolicy,
        store: &'a dyn MatchStore,
        library: &'a dyn Library,
        manual_map: &'a ManualMap,
    ) -> Self {
        let mut finders: Vec<Box<dyn TrackFinder + 'a>> = vec![
            Box::new(CacheFinder::new(policy, store, library)),
            Box::new(ManualOverrideFinder::new(policy, manual_map, library)),
            Box::new(CrossReferenceFinder::new(policy, store, library)),
        ];
        if policy.use_legacy_search {
            finders.push(Box::new(LegacySearchFinder::new(policy, library)));
        } else {
            finders.push(Box::new(StructuralSearchFinder::new(policy, library)));
        }
        Self::with_finders(policy, store, finders)
    }

    /// A chain over explicit finders, tried in the given order.
    pub fn with_finders(
        policy: &MatchingPolicy,
        store: &'a dyn MatchStore,
        finders: Vec<Box<dyn TrackFinder + 'a>>,
    ) -> Self {
        Self {
            policy: policy.clone(),
            finders,
            cache: TrackIdentityCache::new(store),
        }
    }

    pub fn policy(&self) -> &MatchingPolicy {
        &self.policy
    }

    pub fn find_track(&self, provider_id: &str, track: &ProviderTrack) -> Resolution {
        let mut failed = MatchCriteria::NONE;

        for finder in self.finders.iter().filter(|f| f.is_enabled()) {
            let result = finder.find_track(provider_id, track);
            let Some(found) = result.track else {
                failed |= result.failed_criteria;
                continue;
            };

            let kind = finder.kind();
            if self.policy.verbose_logging {
                info!(
                    "{:?} resolved '{}' to library track {}",
                    kind, track.name, found.id
                );
            }
            if kind != FinderKind::Cache {
                let key = ProviderTrackKey::new(provider_id, &track.id);
                if let Err(e) = self.cache.save(&key, &found.id, self.policy.tier, self.policy.criteria) {
                    warn!("Failed to cache match for provider track {}: {}", track.id, e);
                }
            }
            return Resolution::found(found, kind);
        }

        Resolution::miss(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::library::InMemoryLibrary;
    use crate::models::{CachedMatch, IsrcCrossReference, LibraryAlbum, LibraryArtist};
    use crate::store::{IsrcCheck, IsrcFilter, SqliteStore};

    fn policy() -> MatchingPolicy {
        MatchingPolicy {
            tier: MatchTier::IgnoreCase,
            criteria: MatchCriteria::ALL,
            ..Default::default()
        }
    }

    fn library() -> InMemoryLibrary {
        let mut lib = InMemoryLibrary::new();
        lib.add_artist(LibraryArtist {
            id: "ar".to_string(),
            name: "Band".to_string(),
            album_ids: vec!["al".to_string()],
            ..Default::default()
        });
        lib.add_album(LibraryAlbum {
            id: "al".to_string(),
            name: "Album".to_string(),
            artists: vec!["Band".to_string()],
            album_artist_ids: vec!["ar".to_string()],
            ..Default::default()
        });
        lib.add_track(LibraryTrack {
            id: "lib-song".to_string(),
            name: "Song".to_string(),
            album_id: Some("al".to_string()),
            artists: vec!["Band".to_string()],
            ..Default::default()
        });
        lib
    }

    fn provider_track() -> ProviderTrack {
        ProviderTrack {
            id: "sp-song".to_string(),
            name: "song".to_string(),
            album_name: "Album".to_string(),
            album_artist_names: vec!["Band".to_string()],
            artist_names: vec!["Band".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_second_lookup_is_served_by_cache() {
        let store = SqliteStore::open_in_memory().unwrap();
        let lib = library();
        let map = ManualMap::default();
        let chain = FinderChain::new(&policy(), &store, &lib, &map);

        let first = chain.find_track("spotify", &provider_track());
        assert_eq!(first.source, Some(FinderKind::StructuralSearch));
        let second = chain.find_track("spotify", &provider_track());
        assert_eq!(second.source, Some(FinderKind::Cache));
        assert_eq!(first.track, second.track);

        // a cache hit is not written back
        assert_eq!(store.cached_match_count().unwrap(), 1);
    }

    #[test]
    fn test_miss_reports_failed_field() {
        let store = SqliteStore::open_in_memory().unwrap();
        let lib = library();
        let map = ManualMap::default();
        let chain = FinderChain::new(&policy(), &store, &lib, &map);

        let mut track = provider_track();
        track.name = "Unknown Song".to_string();
        let result = chain.find_track("spotify", &track);
        assert!(!result.is_found());
        assert_eq!(result.failed_criteria, MatchCriteria::TRACK_NAME);
        assert_eq!(store.cached_match_count().unwrap(), 0);
    }

    struct Fixed(Option<LibraryTrack>, FinderKind);

    impl TrackFinder for Fixed {
        fn kind(&self) -> FinderKind {
            self.1
        }
        fn is_enabled(&self) -> bool {
            true
        }
        fn find_track(&self, _: &str, _: &ProviderTrack) -> Resolution {
            match &self.0 {
                Some(t) => Resolution::found(t.clone(), self.1),
                None => Resolution::miss(MatchCriteria::ARTISTS),
            }
        }
    }

    /// Store whose writes always fail.
    struct ReadOnlyStore;

    impl MatchStore for ReadOnlyStore {
        fn get_cached_matches(&self, _: &ProviderTrackKey) -> Result<Vec<CachedMatch>> {
            Ok(Vec::new())
        }
        fn insert_cached_match(&self, _: &ProviderTrackKey, _: &CachedMatch) -> Result<i64> {
            Err(crate::error::ResolveError::Config("read only".to_string()))
        }
        fn get_isrc_mappings(&self, _: &IsrcFilter) -> Result<Vec<IsrcCrossReference>> {
            Ok(Vec::new())
        }
        fn get_isrc_checks(&self, _: &IsrcFilter) -> Result<Vec<IsrcCheck>> {
            Ok(Vec::new())
        }
        fn upsert_isrc_mapping(&self, _: &IsrcCrossReference) -> Result<i64> {
            Err(crate::error::ResolveError::Config("read only".to_string()))
        }
        fn delete_isrc_mappings(&self, _: &[i64]) -> Result<bool> {
            Ok(false)
        }
    }

    #[test]
    fn test_first_hit_wins_and_cache_failure_is_swallowed() {
        let store = ReadOnlyStore;
        let hit = LibraryTrack {
            id: "x".to_string(),
            ..Default::default()
        };
        let chain = FinderChain::with_finders(
            &policy(),
            &store,
            vec![
                Box::new(Fixed(None, FinderKind::ManualOverride)),
                Box::new(Fixed(Some(hit.clone()), FinderKind::CrossReference)),
                Box::new(Fixed(None, FinderKind::StructuralSearch)),
            ],
        );
        let result = chain.find_track("spotify", &provider_track());
        assert_eq!(result.track, Some(hit));
        assert_eq!(result.source, Some(FinderKind::CrossReference));
        assert!(result.failed_criteria.is_empty());
    }

    #[test]
    fn test_best_candidate_prefers_priority_then_tier() {
        let track = |id: &str| LibraryTrack {
            id: id.to_string(),
            ..Default::default()
        };
        let best = best_candidate(vec![
            Candidate { priority: 1, tier: MatchTier::Default, track: track("a") },
            Candidate { priority: 0, tier: MatchTier::IgnoreCase, track: track("b") },
            Candidate { priority: 0, tier: MatchTier::Default, track: track("c") },
            Candidate { priority: 0, tier: MatchTier::Default, track: track("d") },
        ]);
        assert_eq!(best.unwrap().track.id, "c");
        assert!(best_candidate(Vec::new()).is_none());
    }
}
