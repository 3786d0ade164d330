//! Library collaborator contract and an in-memory implementation.
//!
//! The host library owns all items; the resolver only queries it. The
//! in-memory library is loaded from a JSON snapshot by the CLI and doubles as
//! the library mock in tests, where insertion order is the enumeration order.

use serde::Deserialize;
use std::path::Path;

use crate::error::Result;
use crate::models::{ExternalIds, ItemKind, LibraryAlbum, LibraryArtist, LibraryItem, LibraryTrack};

pub trait Library {
    fn find_by_id(&self, id: &str) -> Option<LibraryTrack>;

    /// Items of `kind` whose name contains `term`, case-insensitively.
    fn search(&self, term: &str, kind: ItemKind) -> Vec<LibraryItem>;

    /// Items of `kind` carrying any of the identifiers in `ids`. An empty
    /// value matches any identifier stored under that key.
    fn find_by_external_id(&self, ids: &ExternalIds, kind: ItemKind, limit: Option<usize>) -> Vec<LibraryItem>;

    /// Albums directly linked to the artist.
    fn albums_of_artist(&self, artist_id: &str) -> Vec<LibraryAlbum>;

    /// Albums that credit the artist as album artist.
    fn albums_by_album_artist(&self, artist_id: &str) -> Vec<LibraryAlbum>;

    fn tracks_of_album(&self, album_id: &str) -> Vec<LibraryTrack>;
}

// ============================================================================
// In-memory library
// ============================================================================

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct InMemoryLibrary {
    artists: Vec<LibraryArtist>,
    albums: Vec<LibraryAlbum>,
    tracks: Vec<LibraryTrack>,
}

impl InMemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a `{ "artists": [...], "albums": [...], "tracks": [...] }` snapshot.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: InMemoryLibrary = serde_json::from_str(raw)?;
        let mut library = InMemoryLibrary {
            artists: parsed.artists,
            albums: parsed.albums,
            tracks: Vec::with_capacity(parsed.tracks.len()),
        };
        for track in parsed.tracks {
            library.add_track(track);
        }
        Ok(library)
    }

    pub fn add_artist(&mut self, artist: LibraryArtist) -> &mut Self {
        self.artists.push(artist);
        self
    }

    pub fn add_album(&mut self, album: LibraryAlbum) -> &mut Self {
        self.albums.push(album);
        self
    }

    /// Add a track, filling its album name and album artists from the linked
    /// album when the track does not carry them itself.
    pub fn add_track(&mut self, mut track: LibraryTrack) -> &mut Self {
        if let Some(album) = track.album_id.as_deref().and_then(|id| self.album(id)) {
            if track.album_name.is_none() {
                track.album_name = Some(album.name.clone());
            }
            if track.album_artists.is_empty() {
                track.album_artists = album.artists.clone();
            }
        }
        self.tracks.push(track);
        self
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    fn album(&self, id: &str) -> Option<&LibraryAlbum> {
        self.albums.iter().find(|a| a.id == id)
    }

    fn items(&self, kind: ItemKind) -> Box<dyn Iterator<Item = LibraryItem> + '_> {
        match kind {
            ItemKind::Artist => Box::new(self.artists.iter().cloned().map(LibraryItem::Artist)),
            ItemKind::Album => Box::new(self.albums.iter().cloned().map(LibraryItem::Album)),
            ItemKind::Track => Box::new(self.tracks.iter().cloned().map(LibraryItem::Track)),
        }
    }

    fn name_of(item: &LibraryItem) -> &str {
        match item {
            LibraryItem::Artist(a) => &a.name,
            LibraryItem::Album(a) => &a.name,
            LibraryItem::Track(t) => &t.name,
        }
    }

    /// External id lookup for a track also consults its album.
    fn carries(&self, item: &LibraryItem, key: &str, value: &str) -> bool {
        let holds = |ids: &ExternalIds| match ids.get(key) {
            Some(stored) if value.is_empty() => !stored.is_empty(),
            Some(stored) => stored == value,
            None => false,
        };
        if holds(item.external_ids()) {
            return true;
        }
        match item {
            LibraryItem::Track(t) => t
                .album_id
                .as_deref()
                .and_then(|id| self.album(id))
                .is_some_and(|album| holds(&album.external_ids)),
            _ => false,
        }
    }
}

impl Library for InMemoryLibrary {
    fn find_by_id(&self, id: &str) -> Option<LibraryTrack> {
        self.tracks.iter().find(|t| t.id == id).cloned()
    }

    fn search(&self, term: &str, kind: ItemKind) -> Vec<LibraryItem> {
        let term = term.to_lowercase();
        self.items(kind)
            .filter(|item| Self::name_of(item).to_lowercase().contains(&term))
            .collect()
    }

    fn find_by_external_id(&self, ids: &ExternalIds, kind: ItemKind, limit: Option<usize>) -> Vec<LibraryItem> {
        if ids.is_empty() {
            return Vec::new();
        }
        self.items(kind)
            .filter(|item| ids.iter().any(|(k, v)| self.carries(item, k, v)))
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    fn albums_of_artist(&self, artist_id: &str) -> Vec<LibraryAlbum> {
        let Some(artist) = self.artists.iter().find(|a| a.id == artist_id) else {
            return Vec::new();
        };
        artist
            .album_ids
            .iter()
            .filter_map(|id| self.album(id).cloned())
            .collect()
    }

    fn albums_by_album_artist(&self, artist_id: &str) -> Vec<LibraryAlbum> {
        self.albums
            .iter()
            .filter(|a| a.album_artist_ids.iter().any(|id| id == artist_id))
            .cloned()
            .collect()
    }

    fn tracks_of_album(&self, album_id: &str) -> Vec<LibraryTrack> {
        self.tracks
            .iter()
            .filter(|t| t.album_id.as_deref() == Some(album_id))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MUSICBRAINZ_ALBUM, MUSICBRAINZ_TRACK};

    fn sample() -> InMemoryLibrary {
        let mut lib = InMemoryLibrary::new();
        lib.add_artist(LibraryArtist {
            id: "ar1".to_string(),
            name: "Ephixa".to_string(),
            album_ids: vec!["al1".to_string()],
            ..Default::default()
        });
        let mut album_ids = ExternalIds::default();
        album_ids.insert(MUSICBRAINZ_ALBUM.to_string(), "mb-album".to_string());
        lib.add_album(LibraryAlbum {
            id: "al1".to_string(),
            name: "Zelda Dubstep".to_string(),
            artists: vec!["Ephixa".to_string()],
            album_artist_ids: vec!["ar1".to_string()],
            external_ids: album_ids,
        });
        let mut track_ids = ExternalIds::default();
        track_ids.insert(MUSICBRAINZ_TRACK.to_string(), "mb-track".to_string());
        lib.add_track(LibraryTrack {
            id: "t1".to_string(),
            name: "Song of Storms".to_string(),
            album_id: Some("al1".to_string()),
            artists: vec!["Ephixa".to_string()],
            external_ids: track_ids,
            ..Default::default()
        });
        lib
    }

    #[test]
    fn test_track_inherits_album_fields() {
        let lib = sample();
        let track = lib.find_by_id("t1").unwrap();
        assert_eq!(track.album_name.as_deref(), Some("Zelda Dubstep"));
        assert_eq!(track.album_artists, vec!["Ephixa"]);
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let lib = sample();
        assert_eq!(lib.search("ephix", ItemKind::Artist).len(), 1);
        assert_eq!(lib.search("STORMS", ItemKind::Track).len(), 1);
        assert!(lib.search("storms", ItemKind::Album).is_empty());
    }

    #[test]
    fn test_external_id_lookup_consults_album() {
        let lib = sample();
        let mut ids = ExternalIds::default();
        ids.insert(MUSICBRAINZ_ALBUM.to_string(), "mb-album".to_string());
        assert_eq!(lib.find_by_external_id(&ids, ItemKind::Track, None).len(), 1);

        // any identifier is enough
        ids.insert(MUSICBRAINZ_TRACK.to_string(), "other".to_string());
        assert_eq!(lib.find_by_external_id(&ids, ItemKind::Track, None).len(), 1);

        let mut wrong = ExternalIds::default();
        wrong.insert(MUSICBRAINZ_TRACK.to_string(), "other".to_string());
        assert!(lib.find_by_external_id(&wrong, ItemKind::Track, None).is_empty());
        assert!(lib
            .find_by_external_id(&ExternalIds::default(), ItemKind::Track, None)
            .is_empty());
    }

    #[test]
    fn test_empty_value_matches_any_id_under_key() {
        let lib = sample();
        let mut probe = ExternalIds::default();
        probe.insert(MUSICBRAINZ_ALBUM.to_string(), String::new());
        assert_eq!(lib.find_by_external_id(&probe, ItemKind::Album, Some(1)).len(), 1);
        assert!(lib.find_by_external_id(&probe, ItemKind::Artist, Some(1)).is_empty());

        let mut other = ExternalIds::default();
        other.insert("Discogs".to_string(), String::new());
        assert!(lib.find_by_external_id(&other, ItemKind::Track, Some(1)).is_empty());
    }

    #[test]
    fn test_album_links() {
        let lib = sample();
        assert_eq!(lib.albums_of_artist("ar1").len(), 1);
        assert_eq!(lib.albums_by_album_artist("ar1").len(), 1);
        assert!(lib.albums_of_artist("missing").is_empty());
        assert_eq!(lib.tracks_of_album("al1").len(), 1);
    }

    #[test]
    fn test_from_json() {
        let raw = r#"{
            "albums": [{ "id": "al", "name": "Album", "artists": ["Band"] }],
            "tracks": [{ "id": "t", "name": "Song", "album_id": "al", "artists": ["Band"] }]
        }"#;
        let lib = InMemoryLibrary::from_json(raw).unwrap();
        assert_eq!(lib.track_count(), 1);
        assert_eq!(lib.find_by_id("t").unwrap().album_name.as_deref(), Some("Album"));
    }
}
