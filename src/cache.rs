//! Track identity cache: remembers which library track a provider track
//! resolved to, and under which tier and criteria.

use crate::comparison::MatchTier;
use crate::criteria::MatchCriteria;
use crate::error::Result;
use crate::models::{CachedMatch, ProviderTrackKey};
use crate::store::MatchStore;

/// A stored match can be reused if it was found under a tier at least as
/// strict as the one required now, covering at least the required fields.
pub fn is_compatible(stored: &CachedMatch, tier: MatchTier, criteria: MatchCriteria) -> bool {
    stored.tier <= tier && stored.criteria.contains(criteria)
}

pub struct TrackIdentityCache<'a> {
    store: &'a dyn MatchStore,
}

impl<'a> TrackIdentityCache<'a> {
    pub fn new(store: &'a dyn MatchStore) -> Self {
        Self { store }
    }

    /// Library track id of the first compatible cached match, if any.
    pub fn lookup(
        &self,
        key: &ProviderTrackKey,
        tier: MatchTier,
        criteria: MatchCriteria,
    ) -> Result<Option<String>> {
        let matches = self.store.get_cached_matches(key)?;
        Ok(matches
            .into_iter()
            .find(|m| is_compatible(m, tier, criteria))
            .map(|m| m.library_track_id))
    }

    /// Record a match. Always inserts; earlier rows are left untouched.
    pub fn save(
        &self,
        key: &ProviderTrackKey,
        library_track_id: &str,
        tier: MatchTier,
        criteria: MatchCriteria,
    ) -> Result<i64> {
        let cached = CachedMatch {
            id: None,
            library_track_id: library_track_id.to_string(),
            tier,
            criteria,
        };
        self.store.insert_cached_match(key, &cached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    #[test]
    fn test_stricter_tier_is_reused() {
        let store = SqliteStore::open_in_memory().unwrap();
        let cache = TrackIdentityCache::new(&store);
        let key = ProviderTrackKey::new("spotify", "t1");
        cache
            .save(&key, "lib-1", MatchTier::IgnoreCase, MatchCriteria::TRACK_NAME)
            .unwrap();

        let hit = cache
            .lookup(&key, MatchTier::IgnorePunctuationAndCase, MatchCriteria::TRACK_NAME)
            .unwrap();
        assert_eq!(hit.as_deref(), Some("lib-1"));

        let same = cache
            .lookup(&key, MatchTier::IgnoreCase, MatchCriteria::TRACK_NAME)
            .unwrap();
        assert_eq!(same.as_deref(), Some("lib-1"));
    }

    #[test]
    fn test_looser_tier_is_not_reused() {
        let store = SqliteStore::open_in_memory().unwrap();
        let cache = TrackIdentityCache::new(&store);
        let key = ProviderTrackKey::new("spotify", "t1");
        cache
            .save(&key, "lib-1", MatchTier::IgnoreCase, MatchCriteria::TRACK_NAME)
            .unwrap();

        assert!(cache
            .lookup(&key, MatchTier::Default, MatchCriteria::TRACK_NAME)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_narrower_criteria_is_not_reused() {
        let store = SqliteStore::open_in_memory().unwrap();
        let cache = TrackIdentityCache::new(&store);
        let key = ProviderTrackKey::new("spotify", "t1");
        cache
            .save(&key, "lib-1", MatchTier::IgnoreCase, MatchCriteria::TRACK_NAME)
            .unwrap();

        let required = MatchCriteria::TRACK_NAME | MatchCriteria::ALBUM_NAME;
        assert!(cache
            .lookup(&key, MatchTier::IgnorePunctuationAndCase, required)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_first_compatible_row_wins() {
        let store = SqliteStore::open_in_memory().unwrap();
        let cache = TrackIdentityCache::new(&store);
        let key = ProviderTrackKey::new("spotify", "t1");
        cache
            .save(&key, "loose", MatchTier::Fuzzy, MatchCriteria::ALL)
            .unwrap();
        cache
            .save(&key, "strict", MatchTier::Default, MatchCriteria::ALL)
            .unwrap();
        cache
            .save(&key, "also-strict", MatchTier::Default, MatchCriteria::ALL)
            .unwrap();

        let hit = cache
            .lookup(&key, MatchTier::IgnoreCase, MatchCriteria::ALL)
            .unwrap();
        assert_eq!(hit.as_deref(), Some("strict"));
    }
}
