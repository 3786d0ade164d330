//! Cross-reference finder: resolves a provider track through the catalog ids
//! recorded for its ISRC.
//!
//! A recording or track id identifies the library track directly. Release and
//! release-group ids only identify an album, so the tracks found through them
//! still have to agree on the track name.

use log::{info, warn};
use once_cell::unsync::OnceCell;

use super::{best_candidate, Candidate, FinderKind, Resolution, TrackFinder};
use crate::comparison::Comparer;
use crate::criteria::MatchCriteria;
use crate::library::Library;
use crate::models::{
    ExternalIds, IsrcCrossReference, ItemKind, LibraryTrack, ProviderTrack, MUSICBRAINZ_ALBUM,
    MUSICBRAINZ_PROBE_KEYS, MUSICBRAINZ_RECORDING, MUSICBRAINZ_RELEASE_GROUP, MUSICBRAINZ_TRACK,
};
use crate::policy::MatchingPolicy;
use crate::store::{IsrcFilter, MatchStore};
use crate::track_match::track_name_equal;

pub struct CrossReferenceFinder<'a> {
    store: &'a dyn MatchStore,
    library: &'a dyn Library,
    comparer: Comparer,
    enabled: bool,
    verbose: bool,
    library_has_catalog_ids: OnceCell<bool>,
}

impl<'a> CrossReferenceFinder<'a> {
    pub fn new(policy: &MatchingPolicy, store: &'a dyn MatchStore, library: &'a dyn Library) -> Self {
        Self {
            store,
            library,
            comparer: policy.comparer(),
            enabled: policy.enable_cross_reference,
            verbose: policy.verbose_logging,
            library_has_catalog_ids: OnceCell::new(),
        }
    }

    /// Forget the probe result, e.g. after the library was rescanned.
    pub fn invalidate_probe(&mut self) {
        self.library_has_catalog_ids = OnceCell::new();
    }

    fn probe_library(&self) -> bool {
        *self.library_has_catalog_ids.get_or_init(|| {
            let probe: ExternalIds = MUSICBRAINZ_PROBE_KEYS
                .iter()
                .map(|k| (k.to_string(), String::new()))
                .collect();
            let found = [ItemKind::Artist, ItemKind::Album, ItemKind::Track]
                .into_iter()
                .any(|kind| !self.library.find_by_external_id(&probe, kind, Some(1)).is_empty());
            if !found {
                info!("Library carries no MusicBrainz ids, ISRC cross-reference disabled");
            }
            found
        })
    }

    /// Union of the ids stored for the code, ignoring placeholders.
    fn load_mapping(&self, isrc: &str) -> Option<IsrcCrossReference> {
        let filter = IsrcFilter {
            isrc: Some(isrc.to_string()),
            has_any_ids_set: Some(true),
            ..Default::default()
        };
        let records = match self.store.get_isrc_mappings(&filter) {
            Ok(records) => records,
            Err(e) => {
                warn!("Failed to read cross-references for ISRC {}: {}", isrc, e);
                return None;
            }
        };
        let mut records = records.into_iter();
        let mut merged = records.next()?;
        for record in records {
            merged.merge(&record);
        }
        Some(merged)
    }

    fn find_direct(&self, mapping: &IsrcCrossReference) -> Option<LibraryTrack> {
        let count = mapping.recording_ids.len().max(mapping.track_ids.len());
        (0..count).find_map(|ii| {
            let ids = paired_ids(
                (MUSICBRAINZ_RECORDING, mapping.recording_ids.get(ii)),
                (MUSICBRAINZ_TRACK, mapping.track_ids.get(ii)),
            );
            self.library
                .find_by_external_id(&ids, ItemKind::Track, Some(1))
                .into_iter()
                .find_map(|item| item.into_track())
        })
    }

    fn find_through_albums(
        &self,
        mapping: &IsrcCrossReference,
        track: &ProviderTrack,
    ) -> (Option<LibraryTrack>, MatchCriteria) {
        let count = mapping.release_ids.len().max(mapping.release_group_ids.len());
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut rejected = false;

        for ii in 0..count {
            let ids = paired_ids(
                (MUSICBRAINZ_ALBUM, mapping.release_ids.get(ii)),
                (MUSICBRAINZ_RELEASE_GROUP, mapping.release_group_ids.get(ii)),
            );
            for item in self.library.find_by_external_id(&ids, ItemKind::Track, None) {
                let Some(lib_track) = item.into_track() else {
                    continue;
                };
                if candidates.iter().any(|c| c.track.id == lib_track.id) {
                    continue;
                }
                let result = track_name_equal(&self.comparer, &lib_track, track);
                match (result.matched, result.priority, result.tier) {
                    (true, Some(priority), Some(tier)) => {
                        if self.verbose {
                            info!(
                                "> Cross-reference candidate '{}' (priority {}, {:?})",
                                lib_track.name, priority, tier
                            );
                        }
                        candidates.push(Candidate { priority, tier, track: lib_track });
                    }
                    _ => {
                        if self.verbose {
                            info!("> Cross-reference rejected '{}' for '{}'", lib_track.name, track.name);
                        }
                        rejected = true;
                    }
                }
            }
        }

        match best_candidate(candidates) {
            Some(best) => (Some(best.track), MatchCriteria::NONE),
            None if rejected => (None, MatchCriteria::TRACK_NAME),
            None => (None, MatchCriteria::NONE),
        }
    }
}

/// Id map for one index of two parallel id lists; missing or empty ids are left out.
fn paired_ids(first: (&str, Option<&String>), second: (&str, Option<&String>)) -> ExternalIds {
    [first, second]
        .into_iter()
        .filter_map(|(key, id)| {
            id.filter(|id| !id.is_empty())
                .map(|id| (key.to_string(), id.clone()))
        })
        .collect()
}

impl TrackFinder for CrossReferenceFinder<'_> {
    fn kind(&self) -> FinderKind {
        FinderKind::CrossReference
    }

    fn is_enabled(&self) -> bool {
        self.enabled && self.probe_library()
    }

    fn find_track(&self, _provider_id: &str, track: &ProviderTrack) -> Resolution {
        let Some(isrc) = track.isrc.as_deref().filter(|i| !i.is_empty()) else {
            return Resolution::miss(MatchCriteria::NONE);
        };
        let Some(mapping) = self.load_mapping(isrc) else {
            return Resolution::miss(MatchCriteria::NONE);
        };

        if let Some(found) = self.find_direct(&mapping) {
            if self.verbose {
                info!("> ISRC {} identifies '{}' directly", isrc, found.name);
            }
            return Resolution::found(found, FinderKind::CrossReference);
        }

        match self.find_through_albums(&mapping, track) {
            (Some(found), _) => Resolution::found(found, FinderKind::CrossReference),
            (None, failed) => Resolution::miss(failed),
        }
    }
}
