//! String normalization used by the comparison tiers.
//!
//! Every transform here is pure: it takes a name as stored by the provider or
//! the library and returns a relaxed form. The tiers in `comparison` chain
//! these transforms, each looser tier building on the previous one.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// PRE-COMPILED REGEX PATTERNS
// ============================================================================

/// " & " and " and " are treated as the same separator.
pub static AND_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(?:&|and)\s+").unwrap());

/// Unicode punctuation class. Symbols like `$` or `` ` `` are not punctuation.
pub static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{P}").unwrap());

pub static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Any "(...)" or "[...]" group with its surrounding whitespace.
pub static BRACKET_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:\([^\)]*\)|\[[^\]]*\])\s*").unwrap());

/// The last bracket group of a name, e.g. "[foo]" in "Title (Abc) [foo]".
pub static TRAILING_BRACKET_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[\(\[]([^\)\]]*)[\)\]]\s*$").unwrap());

/// Album references embedded in track titles:
/// `Title (From "Album")`, `Title [From the Movie "Album"]`, `Title - From "Album"`.
pub static ALBUM_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\s*(?:[\(\[]From\s(?:[^"]+\s)?"([^\)\]"]*)"[\)\]]|-\sFrom\s(?:[^"]+\s)?"([^\)\]"]*)")"#,
    )
    .unwrap()
});

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Strip diacritics via canonical decomposition, then recompose.
/// e.g., "Beyoncé" → "Beyonce", "Motörhead" → "Motorhead"
pub fn remove_diacritics(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).nfc().collect()
}

/// Case-insensitive equality using full Unicode lowercasing.
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

// ============================================================================
// TIER TRANSFORMS
// ============================================================================

/// Remove punctuation and normalize separators, whitespace and diacritics.
/// Case is preserved; callers compare the result case-insensitively.
pub fn strip_punctuation(s: &str) -> String {
    let s = AND_SEPARATOR.replace_all(s, " ");
    let s = PUNCTUATION.replace_all(&s, "");
    let s = WHITESPACE.replace_all(&s, " ");
    remove_diacritics(s.trim())
}

/// Remove every "(...)" and "[...]" group.
pub fn strip_brackets(s: &str) -> String {
    BRACKET_GROUP.replace_all(s, " ").trim().to_string()
}

/// Remove an embedded album reference such as ` - From "Album"`.
pub fn strip_album_reference(s: &str) -> String {
    ALBUM_REFERENCE.replace_all(s, "").to_string()
}

/// Extract the album named by an embedded reference in a track title.
pub fn album_name_from_title(title: &str) -> Option<String> {
    let caps = ALBUM_REFERENCE.captures(title)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

// ============================================================================
// NAME PARTS
// ============================================================================

/// One comparable form of a name and how far it is from the full name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamePart {
    /// 0 = full name, 1 = name with trailing groups removed, 2 = group contents.
    pub rank: u32,
    pub text: String,
}

/// Break a name into the full string, its shortened forms and its bracket contents.
///
/// For "My Title (Abc) (feat. Xyz) [foo]" this yields:
/// - rank 0: the full name
/// - rank 1: "My Title (Abc) (feat. Xyz)", "My Title (Abc)"
/// - rank 2: "foo", "feat. Xyz", "Abc"
///
/// A shortened form is only kept while it still carries a bracket group; the
/// bare base is left to the bracket-stripping tier.
pub fn split_name_parts(raw: &str) -> Vec<NamePart> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    let mut parts = vec![NamePart {
        rank: 0,
        text: raw.to_string(),
    }];
    let mut contents = Vec::new();

    let mut rest = raw.to_string();
    while let Some(caps) = TRAILING_BRACKET_GROUP.captures(&rest) {
        let inner = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        let group_start = caps.get(0).map_or(rest.len(), |m| m.start());
        contents.push(inner);
        rest.truncate(group_start);

        if TRAILING_BRACKET_GROUP.is_match(&rest) {
            parts.push(NamePart {
                rank: 1,
                text: rest.clone(),
            });
        }
    }

    parts.extend(
        contents
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .map(|text| NamePart { rank: 2, text }),
    );
    parts
}

// ============================================================================
// TESTS
// ============================================================================
