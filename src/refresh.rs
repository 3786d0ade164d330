//! Cross-reference refresh: keeps the ISRC → catalog id table current.
//!
//! Codes with catalog ids are never looked up again. Codes whose last lookup
//! found nothing are retried once their placeholder is older than the retry
//! window; until then they are skipped.

use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{ResolveError, Result};
use crate::models::IsrcCrossReference;
use crate::musicbrainz::MAX_ISRCS_PER_QUERY;
use crate::policy::MatchingPolicy;
use crate::progress::{create_progress_bar, log_progress};
use crate::store::{IsrcFilter, MatchStore};

/// External catalog that maps ISRCs to catalog ids.
pub trait CatalogLookup {
    /// Look up a batch of codes. Codes without any catalog entry are simply
    /// absent from the result.
    fn lookup(&self, isrcs: &[String]) -> Result<Vec<IsrcCrossReference>>;
}

/// Cooperative cancellation flag shared between a job and its caller.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Distinct non-empty codes passed in.
    pub requested: usize,
    /// Codes already resolved or checked within the retry window.
    pub skipped_done: usize,
    pub queried: usize,
    pub resolved: usize,
    pub placeholders: usize,
    pub failed_batches: usize,
}

impl RefreshReport {
    pub fn log(&self) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            info!("[STATS:isrc_refresh]\n{}", json);
        }
    }
}

pub struct IsrcRefresher<'a> {
    store: &'a dyn MatchStore,
    catalog: &'a dyn CatalogLookup,
    retry_days: i64,
    batch_size: usize,
}

impl<'a> IsrcRefresher<'a> {
    pub fn new(policy: &MatchingPolicy, store: &'a dyn MatchStore, catalog: &'a dyn CatalogLookup) -> Self {
        Self {
            store,
            catalog,
            retry_days: policy.isrc_retry_days,
            batch_size: policy.catalog_batch_size.clamp(1, MAX_ISRCS_PER_QUERY),
        }
    }

    /// Refresh the cross-references for `isrcs` as of `now`.
    ///
    /// Rows written before a cancellation are kept.
    pub fn run<I, S>(&self, isrcs: I, cancel: &CancelToken, now: DateTime<Utc>) -> Result<RefreshReport>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cutoff = Duration::try_days(self.retry_days)
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| {
                ResolveError::Config(format!("isrc_retry_days {} is out of range", self.retry_days))
            })?;

        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut pending: Vec<String> = Vec::new();
        for isrc in isrcs {
            let isrc = isrc.as_ref().trim();
            if !isrc.is_empty() && seen.insert(isrc.to_string()) {
                pending.push(isrc.to_string());
            }
        }

        let mut report = RefreshReport {
            requested: pending.len(),
            ..Default::default()
        };
        if pending.is_empty() {
            return Ok(report);
        }

        let done: FxHashSet<String> = self
            .store
            .get_isrc_checks(&IsrcFilter {
                has_any_ids_set: Some(true),
                min_last_checked: Some(cutoff),
                logical_and: false,
                ..Default::default()
            })?
            .into_iter()
            .map(|m| m.isrc)
            .collect();
        pending.retain(|isrc| !done.contains(isrc));
        report.skipped_done = report.requested - pending.len();

        let mut overdue: FxHashMap<String, Vec<i64>> = FxHashMap::default();
        for stale in self.store.get_isrc_checks(&IsrcFilter {
            has_any_ids_set: Some(false),
            max_last_checked: Some(cutoff),
            ..Default::default()
        })? {
            overdue.entry(stale.isrc).or_default().push(stale.id);
        }

        info!(
            "Refreshing {} ISRC(s), {} already done, {} overdue placeholder(s)",
            pending.len(),
            report.skipped_done,
            overdue.len()
        );

        let batches: Vec<&[String]> = pending.chunks(self.batch_size).collect();
        let pb = create_progress_bar(batches.len() as u64, "Looking up ISRCs");
        for (i, batch) in batches.iter().enumerate() {
            if cancel.is_cancelled() {
                pb.abandon();
                report.log();
                return Err(ResolveError::Cancelled);
            }

            self.refresh_batch(batch, &mut overdue, &mut report, now);

            pb.inc(1);
            log_progress("isrc_refresh", i as u64 + 1, batches.len() as u64, 10);
        }
        pb.finish_and_clear();

        report.log();
        Ok(report)
    }

    fn refresh_batch(
        &self,
        batch: &[String],
        overdue: &mut FxHashMap<String, Vec<i64>>,
        report: &mut RefreshReport,
        now: DateTime<Utc>,
    ) {
        let found = match self.catalog.lookup(batch) {
            Ok(found) => found,
            Err(e) => {
                warn!("Catalog lookup failed for {} ISRC(s): {}", batch.len(), e);
                report.failed_batches += 1;
                return;
            }
        };
        report.queried += batch.len();

        let mut resolved: FxHashSet<String> = FxHashSet::default();
        for mut mapping in found {
            if mapping.is_placeholder() {
                continue;
            }
            mapping.id = None;
            mapping.last_checked = now;
            self.drop_overdue(&mapping.isrc, overdue);
            match self.store.upsert_isrc_mapping(&mapping) {
                Ok(_) => {
                    resolved.insert(mapping.isrc);
                }
                Err(e) => warn!("Failed to store cross-reference for ISRC {}: {}", mapping.isrc, e),
            }
        }
        report.resolved += resolved.len();

        for isrc in batch.iter().filter(|i| !resolved.contains(*i)) {
            self.drop_overdue(isrc, overdue);
            match self
                .store
                .upsert_isrc_mapping(&IsrcCrossReference::placeholder(isrc.as_str(), now))
            {
                Ok(_) => report.placeholders += 1,
                Err(e) => warn!("Failed to store placeholder for ISRC {}: {}", isrc, e),
            }
        }
    }

    fn drop_overdue(&self, isrc: &str, overdue: &mut FxHashMap<String, Vec<i64>>) {
        let Some(ids) = overdue.remove(isrc) else {
            return;
        };
        match self.store.delete_isrc_mappings(&ids) {
            Ok(true) => {}
            Ok(false) => warn!("Some stale placeholders for ISRC {} were already gone", isrc),
            Err(e) => warn!("Failed to delete stale placeholders for ISRC {}: {}", isrc, e),
        }
    }
}
