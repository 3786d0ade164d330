//! Ordered string-equivalence tiers.
//!
//! A comparison at tier N tries every tier from `Default` up to N, so any pair
//! accepted at one tier is accepted at every looser tier as well.

use serde::{Deserialize, Serialize};

use crate::normalize::{
    eq_ignore_case, split_name_parts, strip_album_reference, strip_brackets, strip_punctuation,
};

// ============================================================================
// Match Tier
// ============================================================================

/// Strictness levels, strictest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Exact equality.
    Default,
    IgnoreCase,
    /// Punctuation removed, whitespace collapsed, diacritics folded.
    IgnorePunctuationAndCase,
    /// Additionally ignores "(...)" and "[...]" groups.
    IgnoreParensPunctuationAndCase,
    /// Additionally ignores album references like ` - From "Album"` in titles.
    AlbumNameFromTrack,
    /// Bounded Levenshtein distance.
    Fuzzy,
}

impl MatchTier {
    pub const ALL: [MatchTier; 6] = [
        MatchTier::Default,
        MatchTier::IgnoreCase,
        MatchTier::IgnorePunctuationAndCase,
        MatchTier::IgnoreParensPunctuationAndCase,
        MatchTier::AlbumNameFromTrack,
        MatchTier::Fuzzy,
    ];

    /// Stable numeric value used for persistence.
    pub fn as_i64(self) -> i64 {
        match self {
            MatchTier::Default => 0,
            MatchTier::IgnoreCase => 1,
            MatchTier::IgnorePunctuationAndCase => 2,
            MatchTier::IgnoreParensPunctuationAndCase => 3,
            MatchTier::AlbumNameFromTrack => 4,
            MatchTier::Fuzzy => 5,
        }
    }

    pub fn from_i64(value: i64) -> Option<MatchTier> {
        MatchTier::ALL.into_iter().find(|t| t.as_i64() == value)
    }

    /// All tiers from `Default` up to and including `self`.
    pub fn up_to(self) -> impl Iterator<Item = MatchTier> {
        MatchTier::ALL.into_iter().take_while(move |t| *t <= self)
    }
}

// ============================================================================
// Comparison Result
// ============================================================================

/// Outcome of comparing two names.
///
/// `tier` is the strictest tier that accepted the pair. `priority` ranks
/// accepted pairs by how much of the names had to be cut away: 0 means the
/// full names matched, higher values mean shortened forms or bracket contents
/// were needed. Lower is better for both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Comparison {
    pub matched: bool,
    pub tier: Option<MatchTier>,
    pub priority: Option<u32>,
}

impl Comparison {
    pub const UNMATCHED: Comparison = Comparison {
        matched: false,
        tier: None,
        priority: None,
    };

    pub fn matched(tier: MatchTier, priority: u32) -> Self {
        Self {
            matched: true,
            tier: Some(tier),
            priority: Some(priority),
        }
    }

    /// Sort key for ranking candidates; unmatched sorts last.
    pub fn rank(&self) -> (u32, MatchTier) {
        match (self.priority, self.tier) {
            (Some(p), Some(t)) if self.matched => (p, t),
            _ => (u32::MAX, MatchTier::Fuzzy),
        }
    }

    /// The better of two results.
    pub fn best(self, other: Comparison) -> Comparison {
        match (self.matched, other.matched) {
            (true, true) if other.rank() < self.rank() => other,
            (true, _) => self,
            (false, _) => other,
        }
    }
}

// ============================================================================
// Comparer
// ============================================================================

/// Compares names up to a configured tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Comparer {
    pub tier: MatchTier,
    pub max_fuzzy_char_difference: usize,
}

impl Comparer {
    pub fn new(tier: MatchTier, max_fuzzy_char_difference: usize) -> Self {
        Self {
            tier,
            max_fuzzy_char_difference,
        }
    }

    /// Test a single tier without falling back to stricter ones.
    pub fn tier_matches(&self, library: &str, provider: &str, tier: MatchTier) -> bool {
        match tier {
            MatchTier::Default => library == provider,
            MatchTier::IgnoreCase => eq_ignore_case(library, provider),
            MatchTier::IgnorePunctuationAndCase => {
                eq_ignore_case(&strip_punctuation(library), &strip_punctuation(provider))
            }
            MatchTier::IgnoreParensPunctuationAndCase => self.tier_matches(
                &strip_brackets(library),
                &strip_brackets(provider),
                MatchTier::IgnorePunctuationAndCase,
            ),
            MatchTier::AlbumNameFromTrack => self.tier_matches(
                &strip_album_reference(library),
                &strip_album_reference(provider),
                MatchTier::IgnoreParensPunctuationAndCase,
            ),
            MatchTier::Fuzzy => {
                strsim::levenshtein(library, provider) <= self.max_fuzzy_char_difference
            }
        }
    }

    /// Strictest tier up to the configured one that accepts the pair.
    fn satisfying_tier(&self, library: &str, provider: &str) -> Option<MatchTier> {
        self.tier
            .up_to()
            .find(|t| self.tier_matches(library, provider, *t))
    }

    /// Compare a library name with a provider name.
    ///
    /// Both names are split into their full form, shortened forms and bracket
    /// contents. Combinations are tried in order of combined rank; the first
    /// rank with any accepted pair decides the result, reporting the
    /// strictest tier within that rank.
    pub fn equal(&self, library: &str, provider: &str) -> Comparison {
        if library.trim().is_empty() || provider.trim().is_empty() {
            return Comparison::UNMATCHED;
        }

        let library_parts = split_name_parts(library);
        let provider_parts = split_name_parts(provider);

        let mut pairs: Vec<(u32, &str, &str)> = library_parts
            .iter()
            .flat_map(|l| {
                provider_parts
                    .iter()
                    .map(move |p| (l.rank + p.rank, l.text.as_str(), p.text.as_str()))
            })
            .collect();
        pairs.sort_by_key(|(priority, _, _)| *priority);

        let mut best: Option<(u32, MatchTier)> = None;
        for (priority, l, p) in pairs {
            if let Some((best_priority, _)) = best {
                if priority > best_priority {
                    break;
                }
            }
            if let Some(tier) = self.satisfying_tier(l, p) {
                best = match best {
                    Some((bp, bt)) if bt <= tier => Some((bp, bt)),
                    _ => Some((priority, tier)),
                };
            }
        }

        match best {
            Some((priority, tier)) => Comparison::matched(tier, priority),
            None => Comparison::UNMATCHED,
        }
    }

    /// Two name lists intersect if any library name equals any provider name.
    /// Both orientations are tried since the looser tiers are not symmetric.
    pub fn list_intersect(&self, library: &[String], provider: &[String]) -> Comparison {
        let mut best = Comparison::UNMATCHED;
        for l in library {
            for p in provider {
                best = best.best(self.equal(l, p)).best(self.equal(p, l));
                if best.matched && best.rank().0 == 0 && best.tier == Some(MatchTier::Default) {
                    return best;
                }
            }
        }
        best
    }
}

// ============================================================================
// TESTS
// ============================================================================
