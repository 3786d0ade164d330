//! Refresh the ISRC cross-reference table from MusicBrainz.
//!
//! Collects the ISRCs of the given provider playlists and looks up every code
//! that is neither resolved nor checked within the retry window.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use track_resolver::models::ProviderPlaylist;
use track_resolver::musicbrainz::{MusicBrainzClient, DEFAULT_BASE_URL, DEFAULT_USER_AGENT};
use track_resolver::policy::MatchingPolicy;
use track_resolver::progress::{format_duration, set_log_only};
use track_resolver::refresh::{CancelToken, IsrcRefresher};
use track_resolver::store::SqliteStore;

#[derive(Parser)]
#[command(name = "refresh-isrc")]
#[command(about = "Look up provider ISRCs in MusicBrainz and store the catalog ids")]
struct Args {
    /// Provider playlist files (JSON)
    #[arg(required = true)]
    playlists: Vec<PathBuf>,

    #[arg(long, default_value = "track_matches.db")]
    db: PathBuf,

    /// Matching policy (TOML) for the retry window and batch size
    #[arg(long)]
    policy: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    #[arg(long)]
    log_only: bool,

    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut clog = colog::default_builder();
    clog.filter(
        None,
        if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        },
    );
    clog.init();
    set_log_only(args.log_only);

    let start = Instant::now();

    let policy = match &args.policy {
        Some(path) => MatchingPolicy::load(path).context("Failed to load matching policy")?,
        None => MatchingPolicy::default(),
    };

    let mut isrcs: Vec<String> = Vec::new();
    for path in &args.playlists {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read playlist {:?}", path))?;
        let playlist: ProviderPlaylist = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse playlist {:?}", path))?;
        isrcs.extend(playlist.tracks.into_iter().filter_map(|t| t.isrc));
    }
    log::info!("Collected {} ISRC(s) from {} playlist(s)", isrcs.len(), args.playlists.len());

    let store = SqliteStore::open(&args.db)
        .with_context(|| format!("Failed to open database {:?}", args.db))?;
    let client = MusicBrainzClient::new(&args.base_url, &args.user_agent);

    let report = IsrcRefresher::new(&policy, &store, &client)
        .run(&isrcs, &CancelToken::new(), Utc::now())
        .context("ISRC refresh failed")?;

    println!("\n{:=<60}", "");
    println!("ISRC refresh complete!");
    println!("  Requested: {}", report.requested);
    println!("  Already done: {}", report.skipped_done);
    println!("  Queried: {}", report.queried);
    println!("  Resolved: {}", report.resolved);
    println!("  Not found: {}", report.placeholders);
    println!("  Failed batches: {}", report.failed_batches);
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    Ok(())
}
