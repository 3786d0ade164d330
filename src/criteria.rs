//! Required-field bit-mask for track matches.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Fields that must agree for a track match to count.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<CriteriaField>", into = "Vec<CriteriaField>")]
pub struct MatchCriteria(u8);

impl MatchCriteria {
    pub const NONE: MatchCriteria = MatchCriteria(0);
    pub const TRACK_NAME: MatchCriteria = MatchCriteria(1 << 0);
    pub const ALBUM_NAME: MatchCriteria = MatchCriteria(1 << 1);
    pub const ARTISTS: MatchCriteria = MatchCriteria(1 << 2);
    pub const ALBUM_ARTISTS: MatchCriteria = MatchCriteria(1 << 3);
    pub const ALL: MatchCriteria = MatchCriteria(0b1111);

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Build from stored bits, dropping unknown ones.
    pub fn from_bits_truncate(bits: u8) -> Self {
        MatchCriteria(bits & Self::ALL.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is also set here.
    pub fn contains(self, other: MatchCriteria) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn fields(self) -> Vec<CriteriaField> {
        CriteriaField::ALL
            .into_iter()
            .filter(|f| self.contains(f.mask()))
            .collect()
    }
}

impl BitOr for MatchCriteria {
    type Output = MatchCriteria;

    fn bitor(self, rhs: Self) -> Self::Output {
        MatchCriteria(self.0 | rhs.0)
    }
}

impl BitOrAssign for MatchCriteria {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for MatchCriteria {
    type Output = MatchCriteria;

    fn bitand(self, rhs: Self) -> Self::Output {
        MatchCriteria(self.0 & rhs.0)
    }
}

impl fmt::Debug for MatchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MatchCriteria({})", self)
    }
}

impl fmt::Display for MatchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.fields().iter().map(|c| c.name()).collect();
        f.write_str(&names.join("|"))
    }
}

/// Single criteria field, used for config files and reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaField {
    TrackName,
    AlbumName,
    Artists,
    AlbumArtists,
}

impl CriteriaField {
    pub const ALL: [CriteriaField; 4] = [
        CriteriaField::TrackName,
        CriteriaField::AlbumName,
        CriteriaField::Artists,
        CriteriaField::AlbumArtists,
    ];

    pub fn mask(self) -> MatchCriteria {
        match self {
            CriteriaField::TrackName => MatchCriteria::TRACK_NAME,
            CriteriaField::AlbumName => MatchCriteria::ALBUM_NAME,
            CriteriaField::Artists => MatchCriteria::ARTISTS,
            CriteriaField::AlbumArtists => MatchCriteria::ALBUM_ARTISTS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CriteriaField::TrackName => "track_name",
            CriteriaField::AlbumName => "album_name",
            CriteriaField::Artists => "artists",
            CriteriaField::AlbumArtists => "album_artists",
        }
    }
}

impl From<Vec<CriteriaField>> for MatchCriteria {
    fn from(fields: Vec<CriteriaField>) -> Self {
        fields
            .into_iter()
            .fold(MatchCriteria::NONE, |acc, f| acc | f.mask())
    }
}

impl From<MatchCriteria> for Vec<CriteriaField> {
    fn from(criteria: MatchCriteria) -> Self {
        criteria.fields()
    }
}
