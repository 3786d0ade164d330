//! Field-level predicates between a library track and a provider track.

use crate::comparison::{Comparer, Comparison, MatchTier};
use crate::criteria::MatchCriteria;
use crate::models::{LibraryAlbum, LibraryArtist, LibraryTrack, ProviderTrack};
use crate::normalize::album_name_from_title;

pub fn track_name_equal(c: &Comparer, library: &LibraryTrack, provider: &ProviderTrack) -> Comparison {
    c.equal(&library.name, &provider.name)
}

/// Compare a library album name with the provider album.
///
/// From `AlbumNameFromTrack` on, an album referenced in the provider title
/// (`Title - From "Album"`) counts as the provider album too.
pub fn album_name_equal(c: &Comparer, library_album: &str, provider: &ProviderTrack) -> Comparison {
    let direct = c.equal(library_album, &provider.album_name);
    if direct.matched || c.tier < MatchTier::AlbumNameFromTrack {
        return direct;
    }

    match album_name_from_title(&provider.name) {
        Some(embedded) => {
            let result = c.equal(library_album, &embedded);
            match (result.tier, result.priority) {
                (Some(tier), Some(priority)) if result.matched => {
                    Comparison::matched(tier.max(MatchTier::AlbumNameFromTrack), priority)
                }
                _ => Comparison::UNMATCHED,
            }
        }
        None => direct,
    }
}

pub fn track_album_name_equal(c: &Comparer, library: &LibraryTrack, provider: &ProviderTrack) -> Comparison {
    match library.album_name.as_deref() {
        Some(name) => album_name_equal(c, name, provider),
        None => Comparison::UNMATCHED,
    }
}

pub fn artists_intersect(c: &Comparer, library: &LibraryTrack, provider: &ProviderTrack) -> Comparison {
    c.list_intersect(&library.artists, &provider.artist_names)
}

pub fn album_artists_intersect(c: &Comparer, library: &LibraryTrack, provider: &ProviderTrack) -> Comparison {
    c.list_intersect(&library.album_artists, &provider.album_artist_names)
}

pub fn artist_entity_matches(c: &Comparer, artist: &LibraryArtist, provider: &ProviderTrack) -> Comparison {
    c.list_intersect(std::slice::from_ref(&artist.name), &provider.artist_names)
}

pub fn album_entity_name_equal(c: &Comparer, album: &LibraryAlbum, provider: &ProviderTrack) -> Comparison {
    album_name_equal(c, &album.name, provider)
}

pub fn album_entity_artists_intersect(c: &Comparer, album: &LibraryAlbum, provider: &ProviderTrack) -> Comparison {
    c.list_intersect(&album.artists, &provider.album_artist_names)
}

// ============================================================================
// Track-level verdict
// ============================================================================

/// Result of checking every required field of a track pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackVerdict {
    /// All required fields agree. Ranking comes from the track name comparison.
    Matched { priority: u32, tier: MatchTier },
    /// The first required field that did not agree.
    Failed(MatchCriteria),
}

impl TrackVerdict {
    pub fn is_match(&self) -> bool {
        matches!(self, TrackVerdict::Matched { .. })
    }
}

/// Check a library track against a provider track.
///
/// Fields are checked in the order artists, album name, album artists,
/// track name; the first failure is reported. Without the track name in the
/// criteria every match ranks last at the configured tier.
pub fn check_track(
    c: &Comparer,
    criteria: MatchCriteria,
    library: &LibraryTrack,
    provider: &ProviderTrack,
) -> TrackVerdict {
    if criteria.contains(MatchCriteria::ARTISTS) && !artists_intersect(c, library, provider).matched {
        return TrackVerdict::Failed(MatchCriteria::ARTISTS);
    }
    if criteria.contains(MatchCriteria::ALBUM_NAME)
        && !track_album_name_equal(c, library, provider).matched
    {
        return TrackVerdict::Failed(MatchCriteria::ALBUM_NAME);
    }
    if criteria.contains(MatchCriteria::ALBUM_ARTISTS)
        && !album_artists_intersect(c, library, provider).matched
    {
        return TrackVerdict::Failed(MatchCriteria::ALBUM_ARTISTS);
    }

    if !criteria.contains(MatchCriteria::TRACK_NAME) {
        return TrackVerdict::Matched {
            priority: u32::MAX,
            tier: c.tier,
        };
    }
    let name = track_name_equal(c, library, provider);
    match (name.matched, name.priority, name.tier) {
        (true, Some(priority), Some(tier)) => TrackVerdict::Matched { priority, tier },
        _ => TrackVerdict::Failed(MatchCriteria::TRACK_NAME),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ProviderTrack {
        ProviderTrack {
            id: "p1".to_string(),
            name: "Track".to_string(),
            album_name: "Album".to_string(),
            album_artist_names: vec!["Artist On Album".to_string()],
            artist_names: vec!["Just Artist".to_string()],
            ..Default::default()
        }
    }

    fn library(name: &str, album: Option<&str>, album_artist: Option<&str>, artist: Option<&str>) -> LibraryTrack {
        LibraryTrack {
            id: "l1".to_string(),
            name: name.to_string(),
            album_name: album.map(str::to_string),
            album_artists: album_artist
                .map(|a| vec!["abc".to_string(), a.to_string(), "lius987grvalsiuRHH".to_string()])
                .unwrap_or_default(),
            artists: artist
                .map(|a| vec!["abc".to_string(), a.to_string(), "dwoeirg87fadaDUG$ASD".to_string()])
                .unwrap_or_default(),
            ..Default::default()
        }
    }

    #[test]
    fn test_track_name_ignores_other_fields() {
        let c = Comparer::new(MatchTier::Default, 0);
        let prov = provider();
        for lib in [
            library("Track", Some("Album"), Some("Artist On Album"), Some("Just Artist")),
            library("Track", None, None, None),
            library("Track", Some("album"), None, Some("Just artist")),
        ] {
            assert!(track_name_equal(&c, &lib, &prov).matched);
        }
    }

    #[test]
    fn test_album_name_tiers() {
        let prov = provider();
        let lib = library("Track", Some("album"), None, None);
        assert!(!track_album_name_equal(&Comparer::new(MatchTier::Default, 0), &lib, &prov).matched);
        assert!(track_album_name_equal(&Comparer::new(MatchTier::IgnoreCase, 0), &lib, &prov).matched);
        assert!(!track_album_name_equal(
            &Comparer::new(MatchTier::Fuzzy, 0),
            &library("Track", None, None, None),
            &prov
        )
        .matched);
    }

    #[test]
    fn test_album_name_from_track_title() {
        let mut prov = provider();
        prov.name = r#"Track - From "abc""#.to_string();
        prov.album_name = "Soundtrack Collection".to_string();
        let lib = library("Track", Some("abc"), None, None);

        let strict = Comparer::new(MatchTier::IgnoreParensPunctuationAndCase, 0);
        assert!(!track_album_name_equal(&strict, &lib, &prov).matched);

        let loose = Comparer::new(MatchTier::AlbumNameFromTrack, 0);
        let result = track_album_name_equal(&loose, &lib, &prov);
        assert!(result.matched);
        assert_eq!(result.tier, Some(MatchTier::AlbumNameFromTrack));
    }

    #[test]
    fn test_artist_lists() {
        let prov = provider();
        let c = Comparer::new(MatchTier::IgnoreCase, 0);
        assert!(artists_intersect(&c, &library("Track", None, None, Some("just artist")), &prov).matched);
        assert!(album_artists_intersect(&c, &library("Track", None, Some("artist on album"), None), &prov).matched);
        assert!(!artists_intersect(&c, &library("Track", None, None, None), &prov).matched);
    }

    #[test]
    fn test_check_track_reports_first_failure() {
        let c = Comparer::new(MatchTier::Default, 0);
        let prov = provider();

        let ok = library("Track", Some("Album"), Some("Artist On Album"), Some("Just Artist"));
        assert_eq!(
            check_track(&c, MatchCriteria::ALL, &ok, &prov),
            TrackVerdict::Matched { priority: 0, tier: MatchTier::Default }
        );

        let wrong_artist_and_album = library("Track", Some("Other"), Some("Artist On Album"), Some("Nope"));
        assert_eq!(
            check_track(&c, MatchCriteria::ALL, &wrong_artist_and_album, &prov),
            TrackVerdict::Failed(MatchCriteria::ARTISTS)
        );
        assert_eq!(
            check_track(
                &c,
                MatchCriteria::TRACK_NAME | MatchCriteria::ALBUM_NAME,
                &wrong_artist_and_album,
                &prov
            ),
            TrackVerdict::Failed(MatchCriteria::ALBUM_NAME)
        );

        let wrong_name = library("Other Track", Some("Album"), Some("Artist On Album"), Some("Just Artist"));
        assert_eq!(
            check_track(&c, MatchCriteria::ALL, &wrong_name, &prov),
            TrackVerdict::Failed(MatchCriteria::TRACK_NAME)
        );
    }

    #[test]
    fn test_check_track_without_name_ranks_last() {
        let c = Comparer::new(MatchTier::IgnoreCase, 0);
        let lib = library("Anything", None, None, Some("Just Artist"));
        assert_eq!(
            check_track(&c, MatchCriteria::ARTISTS, &lib, &provider()),
            TrackVerdict::Matched { priority: u32::MAX, tier: MatchTier::IgnoreCase }
        );
    }
}
