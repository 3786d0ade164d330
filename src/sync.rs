//! Playlist resolution: runs every provider track of a playlist through the
//! finder chain and collects what was found and what is missing.

use chrono::{DateTime, Utc};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::criteria::MatchCriteria;
use crate::error::{ResolveError, Result};
use crate::finders::{FinderChain, FinderKind};
use crate::models::{LibraryTrack, ProviderPlaylist, ProviderTrack};
use crate::progress::{create_progress_bar, log_progress};
use crate::refresh::CancelToken;

// Characters that are not allowed in file names on common platforms
static ILLEGAL_FILE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).unwrap());

// ============================================================================
// Outcome
// ============================================================================

/// A provider track without a library match, with the fields that defeated
/// the closest candidates.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MissingTrack {
    #[serde(flatten)]
    pub track: ProviderTrack,
    pub failed_criteria: MatchCriteria,
}

#[derive(Clone, Debug, Default)]
pub struct PlaylistOutcome {
    pub playlist_id: String,
    pub provider: String,
    pub total: usize,
    /// Resolved tracks in playlist order, each library track once.
    pub matched: Vec<(ProviderTrack, LibraryTrack)>,
    pub missing: Vec<MissingTrack>,
}

impl PlaylistOutcome {
    /// Playlist tagline describing how much of the provider playlist was found.
    pub fn completeness(&self, at: DateTime<Utc>) -> String {
        format!(
            "Synced {} out of {} tracks from {} playlist {} (at {} [UTC])",
            self.total - self.missing.len(),
            self.total,
            self.provider,
            self.playlist_id,
            at.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Resolution counts across all playlists of a run.
#[derive(Default, Debug, Clone, Serialize)]
pub struct SyncStats {
    pub playlists: usize,
    pub total_tracks: usize,
    pub matched: usize,
    pub missing: usize,
    /// Tracks resolving to a library track already in the playlist.
    pub duplicates: usize,

    // Hits per finder
    pub by_cache: usize,
    pub by_manual_override: usize,
    pub by_cross_reference: usize,
    pub by_structural_search: usize,
    pub by_legacy_search: usize,

    // Misses per failing field (a miss can count towards several)
    pub failed_track_name: usize,
    pub failed_album_name: usize,
    pub failed_artists: usize,
    pub failed_album_artists: usize,

    pub elapsed_seconds: f64,
}

impl SyncStats {
    pub fn match_rate(&self) -> f64 {
        if self.total_tracks == 0 {
            0.0
        } else {
            100.0 * self.matched as f64 / self.total_tracks as f64
        }
    }

    /// Log stats in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            info!("[STATS:{}]\n{}", phase, json);
        }
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn record_hit(&mut self, kind: FinderKind) {
        match kind {
            FinderKind::Cache => self.by_cache += 1,
            FinderKind::ManualOverride => self.by_manual_override += 1,
            FinderKind::CrossReference => self.by_cross_reference += 1,
            FinderKind::StructuralSearch => self.by_structural_search += 1,
            FinderKind::LegacySearch => self.by_legacy_search += 1,
        }
    }

    fn record_miss(&mut self, failed: MatchCriteria) {
        self.missing += 1;
        if failed.contains(MatchCriteria::TRACK_NAME) {
            self.failed_track_name += 1;
        }
        if failed.contains(MatchCriteria::ALBUM_NAME) {
            self.failed_album_name += 1;
        }
        if failed.contains(MatchCriteria::ARTISTS) {
            self.failed_artists += 1;
        }
        if failed.contains(MatchCriteria::ALBUM_ARTISTS) {
            self.failed_album_artists += 1;
        }
    }
}

// ============================================================================
// Sync
// ============================================================================

pub struct PlaylistSync<'a> {
    chain: FinderChain<'a>,
    stats: SyncStats,
}

impl<'a> PlaylistSync<'a> {
    pub fn new(chain: FinderChain<'a>) -> Self {
        Self {
            chain,
            stats: SyncStats::default(),
        }
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Resolve every track of `playlist` in order.
    ///
    /// Stops with `Cancelled` between tracks; matches cached up to that point
    /// are kept.
    pub fn resolve_playlist(&mut self, playlist: &ProviderPlaylist, cancel: &CancelToken) -> Result<PlaylistOutcome> {
        let start = Instant::now();
        let verbose = self.chain.policy().verbose_logging;
        let total = playlist.tracks.len();
        let mut outcome = PlaylistOutcome {
            playlist_id: playlist.id.clone(),
            provider: playlist.provider.clone(),
            total,
            ..Default::default()
        };

        info!("Resolving playlist '{}' ({} tracks)", playlist.name, total);
        let pb = create_progress_bar(total as u64, "Resolving tracks");

        for (i, track) in playlist.tracks.iter().enumerate() {
            if cancel.is_cancelled() {
                pb.abandon();
                return Err(ResolveError::Cancelled);
            }
            if verbose {
                info!(
                    "Now processing provider track {} [{}][{}][{}]",
                    track.name,
                    track.album_name,
                    track.album_artist_names.join("#"),
                    track.artist_names.join("#")
                );
            }

            let resolution = self.chain.find_track(&playlist.provider, track);
            match (resolution.track, resolution.source) {
                (Some(found), Some(source)) => {
                    self.stats.record_hit(source);
                    if outcome.matched.iter().any(|(_, t)| t.id == found.id) {
                        self.stats.duplicates += 1;
                    } else {
                        outcome.matched.push((track.clone(), found));
                    }
                    self.stats.matched += 1;
                }
                _ => {
                    if verbose && !resolution.failed_criteria.is_empty() {
                        info!(
                            "{} did not match for track {} [{}][{}]",
                            resolution.failed_criteria,
                            track.name,
                            track.album_name,
                            track.artist_names.join("#")
                        );
                    }
                    self.stats.record_miss(resolution.failed_criteria);
                    outcome.missing.push(MissingTrack {
                        track: track.clone(),
                        failed_criteria: resolution.failed_criteria,
                    });
                }
            }

            pb.inc(1);
            log_progress("resolve", i as u64 + 1, total as u64, 100);
        }
        pb.finish_and_clear();

        self.stats.playlists += 1;
        self.stats.total_tracks += total;
        self.stats.elapsed_seconds += start.elapsed().as_secs_f64();
        info!(
            "Playlist '{}': {} matched, {} missing",
            playlist.name,
            total - outcome.missing.len(),
            outcome.missing.len()
        );
        Ok(outcome)
    }
}

// ============================================================================
// Missing-track reports
// ============================================================================

pub fn missing_report_path(dir: &Path, playlist_name: &str, at: DateTime<Utc>) -> PathBuf {
    let name = ILLEGAL_FILE_CHARS.replace_all(playlist_name, "");
    dir.join(format!("{}_missing_{}.json", name, at.format("%Y-%m-%d_%H-%M")))
}

/// Write the missing tracks of a playlist as pretty JSON. Returns the file path.
pub fn write_missing_report(
    dir: &Path,
    playlist_name: &str,
    missing: &[MissingTrack],
    at: DateTime<Utc>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = missing_report_path(dir, playlist_name, at);
    std::fs::write(&path, serde_json::to_string_pretty(missing)?)?;
    info!("Wrote {} missing track(s) to {}", missing.len(), path.display());
    Ok(path)
}
