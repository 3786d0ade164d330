//! Manual override finder: exact lookups in the curated override map.

use log::{info, warn};

use super::{FinderKind, Resolution, TrackFinder};
use crate::criteria::MatchCriteria;
use crate::library::Library;
use crate::manual_map::ManualMap;
use crate::models::ProviderTrack;
use crate::policy::MatchingPolicy;

pub struct ManualOverrideFinder<'a> {
    map: &'a ManualMap,
    library: &'a dyn Library,
    verbose: bool,
}

impl<'a> ManualOverrideFinder<'a> {
    pub fn new(policy: &MatchingPolicy, map: &'a ManualMap, library: &'a dyn Library) -> Self {
        Self {
            map,
            library,
            verbose: policy.verbose_logging,
        }
    }
}

impl TrackFinder for ManualOverrideFinder<'_> {
    fn kind(&self) -> FinderKind {
        FinderKind::ManualOverride
    }

    fn is_enabled(&self) -> bool {
        !self.map.is_empty()
    }

    fn find_track(&self, _provider_id: &str, track: &ProviderTrack) -> Resolution {
        let Some(entry) = self.map.find(track) else {
            return Resolution::miss(MatchCriteria::NONE);
        };
        if self.verbose {
            info!("> Manual override for '{}' -> {}", track.name, entry.library.track);
        }
        match self.library.find_by_id(&entry.library.track) {
            Some(found) => Resolution::found(found, FinderKind::ManualOverride),
            None => {
                warn!(
                    "Manual override for '{}' points to missing library track {}",
                    track.name, entry.library.track
                );
                Resolution::miss(MatchCriteria::NONE)
            }
        }
    }
}
