//! Progress bar and logging utilities.
//!
//! Playlist resolution and the ISRC refresh report progress through
//! indicatif bars, or through periodic log lines in log-only mode for
//! tail-friendly output.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Global flag for log-only mode (set from args in main)
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// Format duration in human-readable format
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// Progress bar with consistent styling. Hidden in log-only mode.
pub fn create_progress_bar(len: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        let style = ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} (ETA: {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb
}

/// Log progress every `interval` items, only in log-only mode.
pub fn log_progress(phase: &str, current: u64, total: u64, interval: u64) {
    if !is_log_only() || total == 0 || interval == 0 {
        return;
    }
    if current % interval == 0 || current == total {
        let pct = 100.0 * current as f64 / total as f64;
        log::info!("[{}] {}/{} ({:.1}%)", phase, current, total, pct);
    }
}
