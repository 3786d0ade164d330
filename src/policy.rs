//! Matching policy: which tier and fields a match must satisfy, plus the
//! toggles for optional finders. Passed explicitly into the finder chain.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::comparison::{Comparer, MatchTier};
use crate::criteria::MatchCriteria;
use crate::error::{ResolveError, Result};
use crate::musicbrainz::MAX_ISRCS_PER_QUERY;

/// Days before an ISRC without catalog ids is looked up again.
pub const DEFAULT_ISRC_RETRY_DAYS: i64 = 14;

/// ISRCs per catalog query.
pub const DEFAULT_CATALOG_BATCH_SIZE: usize = 100;

/// Upper bound for the retry window, roughly a century.
pub const MAX_ISRC_RETRY_DAYS: i64 = 36_500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingPolicy {
    pub tier: MatchTier,
    pub criteria: MatchCriteria,
    pub max_fuzzy_char_difference: usize,
    /// Use the ISRC cross-reference finder (only active if the library carries catalog ids).
    pub enable_cross_reference: bool,
    /// Replace the structural search with the flat track-title search.
    pub use_legacy_search: bool,
    /// Trace every candidate accepted or rejected by the finders.
    pub verbose_logging: bool,
    pub isrc_retry_days: i64,
    pub catalog_batch_size: usize,
}

impl Default for MatchingPolicy {
    fn default() -> Self {
        Self {
            tier: MatchTier::IgnoreParensPunctuationAndCase,
            criteria: MatchCriteria::ALL,
            max_fuzzy_char_difference: 2,
            enable_cross_reference: false,
            use_legacy_search: false,
            verbose_logging: false,
            isrc_retry_days: DEFAULT_ISRC_RETRY_DAYS,
            catalog_batch_size: DEFAULT_CATALOG_BATCH_SIZE,
        }
    }
}

impl MatchingPolicy {
    /// Load a policy from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No policy file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let policy: MatchingPolicy =
            toml::from_str(raw).map_err(|e| ResolveError::Config(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.criteria.is_empty() {
            return Err(ResolveError::Config(
                "criteria must name at least one field".to_string(),
            ));
        }
        if self.catalog_batch_size == 0 || self.catalog_batch_size > MAX_ISRCS_PER_QUERY {
            return Err(ResolveError::Config(format!(
                "catalog_batch_size must be between 1 and {}",
                MAX_ISRCS_PER_QUERY
            )));
        }
        if !(0..=MAX_ISRC_RETRY_DAYS).contains(&self.isrc_retry_days) {
            return Err(ResolveError::Config(format!(
                "isrc_retry_days must be between 0 and {}",
                MAX_ISRC_RETRY_DAYS
            )));
        }
        Ok(())
    }

    pub fn comparer(&self) -> Comparer {
        Comparer::new(self.tier, self.max_fuzzy_char_difference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(MatchingPolicy::from_toml("").unwrap(), MatchingPolicy::default());
    }

    #[test]
    fn test_parse_policy() {
        let raw = r#"
            tier = "ignore_case"
            criteria = ["track_name", "artists"]
            max_fuzzy_char_difference = 3
            enable_cross_reference = true
        "#;
        let policy = MatchingPolicy::from_toml(raw).unwrap();
        assert_eq!(policy.tier, MatchTier::IgnoreCase);
        assert_eq!(policy.criteria, MatchCriteria::TRACK_NAME | MatchCriteria::ARTISTS);
        assert_eq!(policy.max_fuzzy_char_difference, 3);
        assert!(policy.enable_cross_reference);
        assert!(!policy.use_legacy_search);
        assert_eq!(policy.isrc_retry_days, 14);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(MatchingPolicy::from_toml("criteria = []").is_err());
        assert!(MatchingPolicy::from_toml("catalog_batch_size = 0").is_err());
        assert!(MatchingPolicy::from_toml("tier = \"loose\"").is_err());
    }

    #[test]
    fn test_rejects_out_of_range_refresh_settings() {
        assert!(MatchingPolicy::from_toml("isrc_retry_days = -1").is_err());
        assert!(MatchingPolicy::from_toml("isrc_retry_days = 1000000000").is_err());
        assert!(MatchingPolicy::from_toml("isrc_retry_days = 36500").is_ok());
        assert!(MatchingPolicy::from_toml("catalog_batch_size = 150").is_err());
        assert!(MatchingPolicy::from_toml("catalog_batch_size = 100").is_ok());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let policy = MatchingPolicy::load(&dir.path().join("policy.toml")).unwrap();
        assert_eq!(policy, MatchingPolicy::default());
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let policy = MatchingPolicy {
            tier: MatchTier::Fuzzy,
            criteria: MatchCriteria::TRACK_NAME | MatchCriteria::ALBUM_NAME,
            ..Default::default()
        };
        let raw = toml::to_string(&policy).unwrap();
        assert_eq!(MatchingPolicy::from_toml(&raw).unwrap(), policy);
    }
}
