//! Human-curated provider track → library track overrides.
//!
//! Stored as a versioned JSON file:
//! `{ "Version": "1.0", "Items": [{ "Library": { "Track": "<id>" }, "Provider": { ... } }] }`

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ResolveError, Result};
use crate::models::ProviderTrack;

/// Newest file version this build understands.
pub const MANUAL_MAP_VERSION: &str = "1.0";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LibraryRef {
    pub track: String,
}

/// Provider side of an override. Compared by exact, case-sensitive equality.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProviderRef {
    pub id: String,
    pub name: String,
    pub album_name: String,
    pub album_artist_names: Vec<String>,
    pub artist_names: Vec<String>,
}

impl ProviderRef {
    /// Same provider id, or every name field identical.
    pub fn matches(&self, track: &ProviderTrack) -> bool {
        (!self.id.is_empty() && self.id == track.id)
            || (self.name == track.name
                && self.album_name == track.album_name
                && self.album_artist_names == track.album_artist_names
                && self.artist_names == track.artist_names)
    }
}

impl From<&ProviderTrack> for ProviderRef {
    fn from(track: &ProviderTrack) -> Self {
        Self {
            id: track.id.clone(),
            name: track.name.clone(),
            album_name: track.album_name.clone(),
            album_artist_names: track.album_artist_names.clone(),
            artist_names: track.artist_names.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManualMapEntry {
    pub library: LibraryRef,
    pub provider: ProviderRef,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ManualMapFile {
    version: Option<String>,
    #[serde(default)]
    items: Vec<ManualMapEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManualMap {
    entries: Vec<ManualMapEntry>,
}

impl ManualMap {
    pub fn new(entries: Vec<ManualMapEntry>) -> Self {
        Self { entries }
    }

    /// Load the override file. A missing file is an empty map.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(ResolveError::ManualMap("manual map is empty".to_string()));
        }
        let file: ManualMapFile = serde_json::from_str(raw)
            .map_err(|e| ResolveError::ManualMap(format!("failed to parse manual map: {}", e)))?;

        let version = file
            .version
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ResolveError::ManualMap("manual map has no version".to_string()))?;
        if !version_supported(&version)? {
            return Err(ResolveError::ManualMap(format!(
                "manual map version {} is newer than supported {}",
                version, MANUAL_MAP_VERSION
            )));
        }

        Ok(Self { entries: file.items })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = ManualMapFile {
            version: Some(MANUAL_MAP_VERSION.to_string()),
            items: self.entries.clone(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    pub fn find(&self, track: &ProviderTrack) -> Option<&ManualMapEntry> {
        self.entries.iter().find(|e| e.provider.matches(track))
    }

    pub fn push(&mut self, entry: ManualMapEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_version(raw: &str) -> Result<Vec<u32>> {
    raw.trim()
        .split('.')
        .map(|part| {
            part.parse::<u32>()
                .map_err(|_| ResolveError::ManualMap(format!("invalid manual map version {}", raw)))
        })
        .collect()
}

fn version_supported(raw: &str) -> Result<bool> {
    let mut actual = parse_version(raw)?;
    let mut supported = parse_version(MANUAL_MAP_VERSION)?;
    let len = actual.len().max(supported.len());
    actual.resize(len, 0);
    supported.resize(len, 0);
    Ok(actual <= supported)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_track() -> ProviderTrack {
        ProviderTrack {
            id: "sp-1".to_string(),
            name: "Track".to_string(),
            album_name: "Album".to_string(),
            album_artist_names: vec!["Band".to_string()],
            artist_names: vec!["Band".to_string(), "Guest".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_matches_by_id_or_full_equality() {
        let track = provider_track();
        let by_id = ProviderRef {
            id: "sp-1".to_string(),
            ..Default::default()
        };
        assert!(by_id.matches(&track));

        let mut by_fields = ProviderRef::from(&track);
        by_fields.id = String::new();
        assert!(by_fields.matches(&track));

        by_fields.name = "track".to_string();
        assert!(!by_fields.matches(&track));

        let mut reordered = ProviderRef::from(&track);
        reordered.id = String::new();
        reordered.artist_names.reverse();
        assert!(!reordered.matches(&track));
    }

    #[test]
    fn test_parse_valid_file() {
        let raw = r#"{
            "Version": "1.0",
            "Items": [{
                "Library": { "Track": "lib-1" },
                "Provider": { "Id": "sp-1", "Name": "Track", "AlbumName": "Album",
                              "AlbumArtistNames": ["Band"], "ArtistNames": ["Band"] }
            }]
        }"#;
        let map = ManualMap::parse(raw).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.find(&provider_track()).unwrap().library.track, "lib-1");
    }

    #[test]
    fn test_rejects_bad_files() {
        assert!(ManualMap::parse("   ").is_err());
        assert!(ManualMap::parse("{ not json").is_err());
        assert!(ManualMap::parse(r#"{ "Items": [] }"#).is_err());
        assert!(ManualMap::parse(r#"{ "Version": "2.0", "Items": [] }"#).is_err());
        assert!(ManualMap::parse(r#"{ "Version": "0.9", "Items": [] }"#).is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manual_track_map.json");
        assert!(ManualMap::load(&path).unwrap().is_empty());

        let mut map = ManualMap::default();
        map.push(ManualMapEntry {
            library: LibraryRef {
                track: "lib-1".to_string(),
            },
            provider: ProviderRef::from(&provider_track()),
        });
        map.save(&path).unwrap();

        let loaded = ManualMap::load(&path).unwrap();
        assert_eq!(loaded, map);
    }
}
