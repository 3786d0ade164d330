//! MusicBrainz catalog lookup for the cross-reference refresh.
//!
//! Searches recordings by ISRC and turns every (ISRC, release) pair of the
//! result into catalog ids, merged into one record per code.

use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{ResolveError, Result};
use crate::models::IsrcCrossReference;
use crate::refresh::CatalogLookup;

pub const DEFAULT_BASE_URL: &str = "https://musicbrainz.org";

/// MusicBrainz rejects anonymous clients.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "track-resolver/",
    env!("CARGO_PKG_VERSION"),
    " (https://musicbrainz.org/doc/MusicBrainz_API)"
);

/// Search results returned per query; one batch never exceeds this.
pub const MAX_ISRCS_PER_QUERY: usize = 100;

// Search API response types
#[derive(Debug, Deserialize)]
struct RecordingSearch {
    #[serde(default)]
    recordings: Vec<Recording>,
}

#[derive(Debug, Deserialize)]
struct Recording {
    id: String,
    #[serde(default)]
    isrcs: Vec<String>,
    #[serde(default)]
    releases: Vec<Release>,
}

#[derive(Debug, Deserialize)]
struct Release {
    id: String,
    #[serde(rename = "release-group")]
    release_group: Option<ReleaseGroup>,
    #[serde(default)]
    media: Vec<Medium>,
}

#[derive(Debug, Deserialize)]
struct ReleaseGroup {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Medium {
    #[serde(default, rename = "track")]
    tracks: Vec<MediumTrack>,
}

#[derive(Debug, Deserialize)]
struct MediumTrack {
    id: String,
}

pub struct MusicBrainzClient {
    agent: ureq::Agent,
    base_url: String,
    user_agent: String,
}

impl MusicBrainzClient {
    pub fn new(base_url: &str, user_agent: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(Duration::from_secs(15))
            .timeout_write(Duration::from_secs(7))
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
        }
    }

    fn search(&self, isrcs: &[String]) -> Result<String> {
        let query = isrcs
            .iter()
            .map(|isrc| format!("isrc:{}", isrc))
            .collect::<Vec<_>>()
            .join(" OR ");
        let limit = isrcs.len().clamp(1, MAX_ISRCS_PER_QUERY).to_string();
        let url = format!("{}/ws/2/recording", self.base_url);

        let response = self
            .agent
            .get(&url)
            .set("User-Agent", &self.user_agent)
            .set("Accept", "application/json")
            .query("query", &query)
            .query("limit", &limit)
            .query("fmt", "json")
            .call()
            .map_err(|e| ResolveError::Catalog(format!("MusicBrainz request failed: {}", e)))?;

        response
            .into_string()
            .map_err(|e| ResolveError::Catalog(format!("MusicBrainz response unreadable: {}", e)))
    }
}

impl Default for MusicBrainzClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_USER_AGENT)
    }
}

impl CatalogLookup for MusicBrainzClient {
    fn lookup(&self, isrcs: &[String]) -> Result<Vec<IsrcCrossReference>> {
        if isrcs.is_empty() {
            return Ok(Vec::new());
        }
        if isrcs.len() > MAX_ISRCS_PER_QUERY {
            return Err(ResolveError::Catalog(format!(
                "at most {} ISRCs per MusicBrainz query, got {}",
                MAX_ISRCS_PER_QUERY,
                isrcs.len()
            )));
        }
        let body = self.search(isrcs)?;
        parse_recording_search(&body, isrcs)
    }
}

/// Turn a recording search response into one record per requested code.
///
/// Codes carried by a recording but not asked for are ignored.
pub fn parse_recording_search(body: &str, requested: &[String]) -> Result<Vec<IsrcCrossReference>> {
    let search: RecordingSearch = serde_json::from_str(body)?;
    let checked_at = Utc::now();
    let mut merged: Vec<IsrcCrossReference> = Vec::new();

    for recording in search.recordings {
        for isrc in recording.isrcs.iter().filter(|i| requested.contains(i)) {
            let mut entry = IsrcCrossReference::placeholder(isrc.as_str(), checked_at);
            entry.recording_ids.push(recording.id.clone());
            for release in &recording.releases {
                entry.release_ids.push(release.id.clone());
                entry.track_ids.push(
                    release
                        .media
                        .iter()
                        .flat_map(|m| m.tracks.first())
                        .map(|t| t.id.clone())
                        .next()
                        .unwrap_or_default(),
                );
                if let Some(group) = &release.release_group {
                    if !entry.release_group_ids.contains(&group.id) {
                        entry.release_group_ids.push(group.id.clone());
                    }
                }
            }

            match merged.iter_mut().find(|m| m.isrc == *isrc) {
                Some(existing) => merge_paired(existing, &entry),
                None => merged.push(entry),
            }
        }
    }
    Ok(merged)
}

/// Merge another record for the same code. Release and track ids stay
/// position-aligned, so they are appended as pairs.
fn merge_paired(into: &mut IsrcCrossReference, other: &IsrcCrossReference) {
    for (i, release) in other.release_ids.iter().enumerate() {
        let track = other.track_ids.get(i).cloned().unwrap_or_default();
        let known = into
            .release_ids
            .iter()
            .zip(into.track_ids.iter())
            .any(|(r, t)| r == release && *t == track);
        if !known {
            into.release_ids.push(release.clone());
            into.track_ids.push(track);
        }
    }
    let rest = IsrcCrossReference {
        release_ids: Vec::new(),
        track_ids: Vec::new(),
        ..other.clone()
    };
    into.merge(&rest);
}
