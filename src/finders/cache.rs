//! Cache finder: reuses previously resolved matches.

use log::warn;

use super::{FinderKind, Resolution, TrackFinder};
use crate::cache::TrackIdentityCache;
use crate::comparison::MatchTier;
use crate::criteria::MatchCriteria;
use crate::library::Library;
use crate::models::{ProviderTrack, ProviderTrackKey};
use crate::policy::MatchingPolicy;
use crate::store::MatchStore;

pub struct CacheFinder<'a> {
    cache: TrackIdentityCache<'a>,
    library: &'a dyn Library,
    tier: MatchTier,
    criteria: MatchCriteria,
}

impl<'a> CacheFinder<'a> {
    pub fn new(policy: &MatchingPolicy, store: &'a dyn MatchStore, library: &'a dyn Library) -> Self {
        Self {
            cache: TrackIdentityCache::new(store),
            library,
            tier: policy.tier,
            criteria: policy.criteria,
        }
    }
}

impl TrackFinder for CacheFinder<'_> {
    fn kind(&self) -> FinderKind {
        FinderKind::Cache
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn find_track(&self, provider_id: &str, track: &ProviderTrack) -> Resolution {
        let key = ProviderTrackKey::new(provider_id, &track.id);
        let library_id = match self.cache.lookup(&key, self.tier, self.criteria) {
            Ok(Some(id)) => id,
            Ok(None) => return Resolution::miss(MatchCriteria::NONE),
            Err(e) => {
                warn!("Cache lookup failed for provider track {}: {}", track.id, e);
                return Resolution::miss(MatchCriteria::NONE);
            }
        };

        // the library may have dropped the track since it was cached
        match self.library.find_by_id(&library_id) {
            Some(found) => Resolution::found(found, FinderKind::Cache),
            None => Resolution::miss(MatchCriteria::NONE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::InMemoryLibrary;
    use crate::models::LibraryTrack;
    use crate::store::SqliteStore;

    fn setup() -> (SqliteStore, InMemoryLibrary, ProviderTrack) {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut lib = InMemoryLibrary::new();
        lib.add_track(LibraryTrack {
            id: "lib-1".to_string(),
            name: "Track".to_string(),
            ..Default::default()
        });
        let track = ProviderTrack {
            id: "sp-1".to_string(),
            name: "Track".to_string(),
            ..Default::default()
        };
        (store, lib, track)
    }

    #[test]
    fn test_hit_for_compatible_entry() {
        let (store, lib, track) = setup();
        TrackIdentityCache::new(&store)
            .save(&ProviderTrackKey::new("spotify", "sp-1"), "lib-1", MatchTier::IgnoreCase, MatchCriteria::TRACK_NAME)
            .unwrap();

        let policy = MatchingPolicy {
            tier: MatchTier::IgnorePunctuationAndCase,
            criteria: MatchCriteria::TRACK_NAME,
            ..Default::default()
        };
        let finder = CacheFinder::new(&policy, &store, &lib);
        let result = finder.find_track("spotify", &track);
        assert_eq!(result.track.map(|t| t.id), Some("lib-1".to_string()));

        // other provider, same track id
        assert!(!finder.find_track("deezer", &track).is_found());
    }

    #[test]
    fn test_miss_for_incompatible_entry() {
        let (store, lib, track) = setup();
        TrackIdentityCache::new(&store)
            .save(&ProviderTrackKey::new("spotify", "sp-1"), "lib-1", MatchTier::IgnoreCase, MatchCriteria::TRACK_NAME)
            .unwrap();

        let policy = MatchingPolicy {
            tier: MatchTier::IgnorePunctuationAndCase,
            criteria: MatchCriteria::TRACK_NAME | MatchCriteria::ALBUM_NAME,
            ..Default::default()
        };
        let finder = CacheFinder::new(&policy, &store, &lib);
        assert!(!finder.find_track("spotify", &track).is_found());
    }

    #[test]
    fn test_miss_when_library_track_is_gone() {
        let (store, lib, track) = setup();
        TrackIdentityCache::new(&store)
            .save(&ProviderTrackKey::new("spotify", "sp-1"), "deleted", MatchTier::Default, MatchCriteria::ALL)
            .unwrap();
        let finder = CacheFinder::new(&MatchingPolicy::default(), &store, &lib);
        assert!(!finder.find_track("spotify", &track).is_found());
    }
}
