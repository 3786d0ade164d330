//! Legacy search: a flat title search over all library tracks, checking every
//! required field on each hit.

use log::info;

use super::{best_candidate, Candidate, FinderKind, Resolution, TrackFinder};
use crate::comparison::Comparer;
use crate::criteria::MatchCriteria;
use crate::library::Library;
use crate::models::{ItemKind, ProviderTrack};
use crate::policy::MatchingPolicy;
use crate::track_match::{check_track, TrackVerdict};

const SEARCH_PREFIX_CHARS: usize = 5;

pub struct LegacySearchFinder<'a> {
    library: &'a dyn Library,
    comparer: Comparer,
    criteria: MatchCriteria,
    verbose: bool,
}

impl<'a> LegacySearchFinder<'a> {
    pub fn new(policy: &MatchingPolicy, library: &'a dyn Library) -> Self {
        Self {
            library,
            comparer: policy.comparer(),
            criteria: policy.criteria,
            verbose: policy.verbose_logging,
        }
    }
}

impl TrackFinder for LegacySearchFinder<'_> {
    fn kind(&self) -> FinderKind {
        FinderKind::LegacySearch
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn find_track(&self, _provider_id: &str, track: &ProviderTrack) -> Resolution {
        let term: String = track.name.trim().chars().take(SEARCH_PREFIX_CHARS).collect();
        if term.is_empty() {
            return Resolution::miss(MatchCriteria::TRACK_NAME);
        }

        let mut failed = MatchCriteria::NONE;
        let mut candidates = Vec::new();
        for lib_track in self
            .library
            .search(&term, ItemKind::Track)
            .into_iter()
            .filter_map(|item| item.into_track())
        {
            match check_track(&self.comparer, self.criteria, &lib_track, track) {
                TrackVerdict::Matched { priority, tier } => candidates.push(Candidate {
                    priority,
                    tier,
                    track: lib_track,
                }),
                TrackVerdict::Failed(field) => {
                    if self.verbose {
                        info!("> '{}' rejected for '{}' on {}", lib_track.name, track.name, field);
                    }
                    failed |= field;
                }
            }
        }

        match best_candidate(candidates) {
            Some(best) => Resolution::found(best.track, FinderKind::LegacySearch),
            None if failed.is_empty() => Resolution::miss(MatchCriteria::TRACK_NAME),
            None => Resolution::miss(failed),
        }
    }
}
