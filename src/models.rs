//! Core data models for track identity resolution.
//!
//! Provider tracks come from the playlist source, library items describe what
//! already exists in the local collection, and the persisted records (cached
//! matches and ISRC cross-references) tie the two together.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::comparison::MatchTier;
use crate::criteria::MatchCriteria;

// ============================================================================
// Type Aliases
// ============================================================================

/// External catalog identifiers keyed by scheme (e.g. "MusicBrainzTrack").
pub type ExternalIds = FxHashMap<String, String>;

// ============================================================================
// External Identifier Keys
// ============================================================================

pub const MUSICBRAINZ_ARTIST: &str = "MusicBrainzArtist";
pub const MUSICBRAINZ_ALBUM_ARTIST: &str = "MusicBrainzAlbumArtist";
pub const MUSICBRAINZ_ALBUM: &str = "MusicBrainzAlbum";
pub const MUSICBRAINZ_RELEASE_GROUP: &str = "MusicBrainzReleaseGroup";
pub const MUSICBRAINZ_TRACK: &str = "MusicBrainzTrack";
pub const MUSICBRAINZ_RECORDING: &str = "MusicBrainzRecording";

/// Keys whose presence anywhere in the library means it was tagged against MusicBrainz.
pub const MUSICBRAINZ_PROBE_KEYS: [&str; 5] = [
    MUSICBRAINZ_ARTIST,
    MUSICBRAINZ_ALBUM_ARTIST,
    MUSICBRAINZ_RELEASE_GROUP,
    MUSICBRAINZ_ALBUM,
    MUSICBRAINZ_TRACK,
];

// ============================================================================
// Provider Models
// ============================================================================

/// A track as listed by the playlist provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderTrack {
    pub id: String,
    pub name: String,
    pub album_name: String,
    pub album_artist_names: Vec<String>,
    pub artist_names: Vec<String>,
    pub track_number: u32,
    pub isrc: Option<String>,
}

/// A playlist as listed by the provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderPlaylist {
    pub id: String,
    pub name: String,
    /// Provider the playlist comes from. Cached matches are keyed by it.
    pub provider: String,
    pub tracks: Vec<ProviderTrack>,
}

/// Identifies a provider track within one provider (e.g. "spotify").
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProviderTrackKey {
    pub provider_id: String,
    pub track_id: String,
}

impl ProviderTrackKey {
    pub fn new(provider_id: impl Into<String>, track_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            track_id: track_id.into(),
        }
    }
}

// ============================================================================
// Library Models
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Artist,
    Album,
    Track,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryArtist {
    pub id: String,
    pub name: String,
    /// Albums directly linked to this artist. May be empty even when albums
    /// credit the artist, in which case lookups fall back to album artists.
    pub album_ids: Vec<String>,
    pub external_ids: ExternalIds,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryAlbum {
    pub id: String,
    pub name: String,
    /// Album artist names.
    pub artists: Vec<String>,
    pub album_artist_ids: Vec<String>,
    pub external_ids: ExternalIds,
}

/// A track owned by the host library. Read-only from the resolver's side.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryTrack {
    pub id: String,
    pub name: String,
    pub album_id: Option<String>,
    pub album_name: Option<String>,
    pub album_artists: Vec<String>,
    pub artists: Vec<String>,
    pub external_ids: ExternalIds,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LibraryItem {
    Artist(LibraryArtist),
    Album(LibraryAlbum),
    Track(LibraryTrack),
}

impl LibraryItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            LibraryItem::Artist(_) => ItemKind::Artist,
            LibraryItem::Album(_) => ItemKind::Album,
            LibraryItem::Track(_) => ItemKind::Track,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            LibraryItem::Artist(a) => &a.id,
            LibraryItem::Album(a) => &a.id,
            LibraryItem::Track(t) => &t.id,
        }
    }

    pub fn external_ids(&self) -> &ExternalIds {
        match self {
            LibraryItem::Artist(a) => &a.external_ids,
            LibraryItem::Album(a) => &a.external_ids,
            LibraryItem::Track(t) => &t.external_ids,
        }
    }

    pub fn into_track(self) -> Option<LibraryTrack> {
        match self {
            LibraryItem::Track(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_artist(self) -> Option<LibraryArtist> {
        match self {
            LibraryItem::Artist(a) => Some(a),
            _ => None,
        }
    }
}

// ============================================================================
// Persisted Records
// ============================================================================

/// A previously resolved provider track, tagged with the tier and criteria
/// that were required when it was found.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedMatch {
    pub id: Option<i64>,
    pub library_track_id: String,
    pub tier: MatchTier,
    pub criteria: MatchCriteria,
}

/// Catalog identifiers known for one ISRC.
///
/// A record with every id list empty is a placeholder: the code was looked up
/// at `last_checked` and nothing was found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IsrcCrossReference {
    pub id: Option<i64>,
    pub isrc: String,
    pub last_checked: DateTime<Utc>,
    pub recording_ids: Vec<String>,
    pub release_ids: Vec<String>,
    pub track_ids: Vec<String>,
    pub release_group_ids: Vec<String>,
}

impl IsrcCrossReference {
    pub fn placeholder(isrc: impl Into<String>, checked_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            isrc: isrc.into(),
            last_checked: checked_at,
            recording_ids: Vec::new(),
            release_ids: Vec::new(),
            track_ids: Vec::new(),
            release_group_ids: Vec::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.recording_ids.is_empty()
            && self.release_ids.is_empty()
            && self.track_ids.is_empty()
            && self.release_group_ids.is_empty()
    }

    /// Merge the ids of another record for the same code, keeping first-seen order.
    pub fn merge(&mut self, other: &IsrcCrossReference) {
        fn extend_unique(into: &mut Vec<String>, from: &[String]) {
            for id in from {
                if !into.contains(id) {
                    into.push(id.clone());
                }
            }
        }
        extend_unique(&mut self.recording_ids, &other.recording_ids);
        extend_unique(&mut self.release_ids, &other.release_ids);
        extend_unique(&mut self.track_ids, &other.track_ids);
        extend_unique(&mut self.release_group_ids, &other.release_group_ids);
        if other.last_checked > self.last_checked {
            self.last_checked = other.last_checked;
        }
    }
}
