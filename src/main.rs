use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use track_resolver::finders::FinderChain;
use track_resolver::library::InMemoryLibrary;
use track_resolver::manual_map::ManualMap;
use track_resolver::models::ProviderPlaylist;
use track_resolver::policy::MatchingPolicy;
use track_resolver::progress::{format_duration, set_log_only};
use track_resolver::refresh::CancelToken;
use track_resolver::store::SqliteStore;
use track_resolver::sync::{write_missing_report, PlaylistOutcome, PlaylistSync};

#[derive(Parser)]
#[command(name = "track-resolver")]
#[command(about = "Resolve provider playlists against a local library snapshot")]
struct Args {
    /// Library snapshot (JSON with artists, albums and tracks)
    library: PathBuf,

    /// Provider playlist files (JSON)
    #[arg(required = true)]
    playlists: Vec<PathBuf>,

    /// Match cache and ISRC cross-reference database
    #[arg(long, default_value = "track_matches.db")]
    db: PathBuf,

    /// Matching policy (TOML). Defaults apply when absent.
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Manual override file (JSON)
    #[arg(long)]
    manual_map: Option<PathBuf>,

    /// Write a missing-track report per playlist into this directory
    #[arg(long)]
    missing_dir: Option<PathBuf>,

    /// Write resolved track ids per playlist as JSON
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write run statistics as JSON
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Log-only mode: no progress bars, periodic log lines instead
    #[arg(long)]
    log_only: bool,

    /// Debug logging and per-candidate traces
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Serialize)]
struct ResolvedPlaylist {
    id: String,
    provider: String,
    completeness: String,
    tracks: Vec<ResolvedTrack>,
}

#[derive(Serialize)]
struct ResolvedTrack {
    provider_track_id: String,
    library_track_id: String,
}

impl ResolvedPlaylist {
    fn from_outcome(outcome: &PlaylistOutcome) -> Self {
        Self {
            id: outcome.playlist_id.clone(),
            provider: outcome.provider.clone(),
            completeness: outcome.completeness(Utc::now()),
            tracks: outcome
                .matched
                .iter()
                .map(|(provider, library)| ResolvedTrack {
                    provider_track_id: provider.id.clone(),
                    library_track_id: library.id.clone(),
                })
                .collect(),
        }
    }
}

fn init_logging(verbose: bool) {
    let mut clog = colog::default_builder();
    clog.filter(
        None,
        if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        },
    );
    clog.init();
}

fn load_playlist(path: &Path) -> Result<ProviderPlaylist> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read playlist {:?}", path))?;
    let mut playlist: ProviderPlaylist = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse playlist {:?}", path))?;
    if playlist.provider.trim().is_empty() {
        bail!("Playlist {:?} does not name its provider", path);
    }
    if playlist.name.trim().is_empty() {
        playlist.name = playlist.id.clone();
    }
    Ok(playlist)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    set_log_only(args.log_only);

    let start = Instant::now();

    let mut policy = match &args.policy {
        Some(path) => MatchingPolicy::load(path).context("Failed to load matching policy")?,
        None => MatchingPolicy::default(),
    };
    if args.verbose {
        policy.verbose_logging = true;
    }
    log::info!(
        "Matching at tier {:?} on fields {}",
        policy.tier,
        policy.criteria
    );

    let library = InMemoryLibrary::from_json_file(&args.library)
        .with_context(|| format!("Failed to load library snapshot {:?}", args.library))?;
    log::info!("Loaded library with {} tracks", library.track_count());

    let manual_map = match &args.manual_map {
        Some(path) => ManualMap::load(path).context("Failed to load manual override file")?,
        None => ManualMap::default(),
    };
    if !manual_map.is_empty() {
        log::info!("Loaded {} manual override(s)", manual_map.len());
    }

    let store = SqliteStore::open(&args.db)
        .with_context(|| format!("Failed to open database {:?}", args.db))?;

    let playlists = args
        .playlists
        .iter()
        .map(|path| load_playlist(path))
        .collect::<Result<Vec<_>>>()?;

    let cancel = CancelToken::new();
    let mut sync = PlaylistSync::new(FinderChain::new(&policy, &store, &library, &manual_map));
    let mut resolved = Vec::with_capacity(playlists.len());

    for playlist in &playlists {
        let outcome = sync
            .resolve_playlist(playlist, &cancel)
            .with_context(|| format!("Failed to resolve playlist {}", playlist.id))?;
        println!("{}: {}", playlist.name, outcome.completeness(Utc::now()));

        if let Some(dir) = &args.missing_dir {
            if !outcome.missing.is_empty() {
                write_missing_report(dir, &playlist.name, &outcome.missing, Utc::now())
                    .context("Failed to write missing-track report")?;
            }
        }
        resolved.push(ResolvedPlaylist::from_outcome(&outcome));
    }

    if let Some(path) = &args.output {
        std::fs::write(path, serde_json::to_string_pretty(&resolved)?)
            .with_context(|| format!("Failed to write {:?}", path))?;
    }

    let stats = sync.stats();
    stats.log_phase("final");
    if let Some(path) = &args.stats {
        stats.write_to_file(path).context("Failed to write stats")?;
    }

    println!("\n{:=<60}", "");
    println!("Resolution complete!");
    println!("  Playlists: {}", stats.playlists);
    println!("  Tracks: {} ({:.1}% matched)", stats.total_tracks, stats.match_rate());
    println!("  Missing: {}", stats.missing);
    println!("  Cached matches: {}", store.cached_match_count()?);
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    Ok(())
}
