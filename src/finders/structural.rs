//! Structural search: walks library artists, then their albums, then the
//! album tracks, pooling every track that passes as a ranked candidate.

use log::info;

use super::{best_candidate, Candidate, FinderKind, Resolution, TrackFinder};
use crate::comparison::Comparer;
use crate::criteria::MatchCriteria;
use crate::library::Library;
use crate::models::{ItemKind, LibraryAlbum, LibraryArtist, ProviderTrack};
use crate::policy::MatchingPolicy;
use crate::track_match::{
    album_entity_artists_intersect, album_entity_name_equal, artist_entity_matches, track_name_equal,
};

/// Characters of a provider artist name used as the library search term.
const SEARCH_PREFIX_CHARS: usize = 5;

pub struct StructuralSearchFinder<'a> {
    library: &'a dyn Library,
    comparer: Comparer,
    criteria: MatchCriteria,
    verbose: bool,
}

impl<'a> StructuralSearchFinder<'a> {
    pub fn new(policy: &MatchingPolicy, library: &'a dyn Library) -> Self {
        Self {
            library,
            comparer: policy.comparer(),
            criteria: policy.criteria,
            verbose: policy.verbose_logging,
        }
    }

    /// Library artists found for any provider artist, in provider order,
    /// each library artist once.
    fn artist_candidates(&self, track: &ProviderTrack, failed: &mut MatchCriteria) -> Vec<LibraryArtist> {
        let mut accepted: Vec<LibraryArtist> = Vec::new();

        for name in track.artist_names.iter().filter(|n| !n.trim().is_empty()) {
            let term: String = name.chars().take(SEARCH_PREFIX_CHARS).collect();
            let found: Vec<LibraryArtist> = self
                .library
                .search(&term, ItemKind::Artist)
                .into_iter()
                .filter_map(|item| item.into_artist())
                .collect();

            for artist in found {
                if accepted.iter().any(|a| a.id == artist.id) {
                    continue;
                }
                if self.criteria.contains(MatchCriteria::ARTISTS)
                    && !artist_entity_matches(&self.comparer, &artist, track).matched
                {
                    if self.verbose {
                        info!("> Artist '{}' rejected for '{}'", artist.name, track.name);
                    }
                    *failed |= MatchCriteria::ARTISTS;
                    continue;
                }
                accepted.push(artist);
            }
        }

        if accepted.is_empty() {
            *failed |= MatchCriteria::ARTISTS;
        }
        accepted
    }

    /// Albums of an accepted artist that pass the album-level fields.
    fn album_candidates(
        &self,
        artist: &LibraryArtist,
        track: &ProviderTrack,
        failed: &mut MatchCriteria,
    ) -> Vec<LibraryAlbum> {
        let mut albums = self.library.albums_of_artist(&artist.id);
        if albums.is_empty() {
            albums = self.library.albums_by_album_artist(&artist.id);
        }
        if albums.is_empty() {
            *failed |= MatchCriteria::ALBUM_NAME;
            return albums;
        }

        albums.retain(|album| {
            if self.criteria.contains(MatchCriteria::ALBUM_NAME)
                && !album_entity_name_equal(&self.comparer, album, track).matched
            {
                *failed |= MatchCriteria::ALBUM_NAME;
                return false;
            }
            if self.criteria.contains(MatchCriteria::ALBUM_ARTISTS)
                && !album_entity_artists_intersect(&self.comparer, album, track).matched
            {
                *failed |= MatchCriteria::ALBUM_ARTISTS;
                return false;
            }
            true
        });
        if self.verbose {
            info!(
                "> {} album(s) of '{}' accepted for '{}'",
                albums.len(),
                artist.name,
                track.name
            );
        }
        albums
    }

    fn track_candidates(
        &self,
        album: &LibraryAlbum,
        track: &ProviderTrack,
        failed: &mut MatchCriteria,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for lib_track in self.library.tracks_of_album(&album.id) {
            if !self.criteria.contains(MatchCriteria::TRACK_NAME) {
                candidates.push(Candidate {
                    priority: u32::MAX,
                    tier: self.comparer.tier,
                    track: lib_track,
                });
                continue;
            }
            let result = track_name_equal(&self.comparer, &lib_track, track);
            match (result.matched, result.priority, result.tier) {
                (true, Some(priority), Some(tier)) => candidates.push(Candidate {
                    priority,
                    tier,
                    track: lib_track,
                }),
                _ => *failed |= MatchCriteria::TRACK_NAME,
            }
        }
        if candidates.is_empty() {
            *failed |= MatchCriteria::TRACK_NAME;
        }
        candidates
    }
}

impl TrackFinder for StructuralSearchFinder<'_> {
    fn kind(&self) -> FinderKind {
        FinderKind::StructuralSearch
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn find_track(&self, _provider_id: &str, track: &ProviderTrack) -> Resolution {
        let mut failed = MatchCriteria::NONE;
        let mut pool: Vec<Candidate> = Vec::new();

        for artist in self.artist_candidates(track, &mut failed) {
            for album in self.album_candidates(&artist, track, &mut failed) {
                for candidate in self.track_candidates(&album, track, &mut failed) {
                    // the same album can be reached through several artists
                    if !pool.iter().any(|c| c.track.id == candidate.track.id) {
                        pool.push(candidate);
                    }
                }
            }
        }

        match best_candidate(pool) {
            Some(best) => {
                if self.verbose {
                    info!(
                        "> Structural search picked '{}' (priority {}, {:?}) for '{}'",
                        best.track.name, best.priority, best.tier, track.name
                    );
                }
                Resolution::found(best.track, FinderKind::StructuralSearch)
            }
            None => Resolution::miss(failed),
        }
    }
}
