use serde::{Deserialize, Serialize};

/// Queries shorter than this never match by bare substring
pub const DEFAULT_MIN_SUBSTRING_LEN: usize = 5;

/// Chain-event arrows some tables prefix to event names
const CHAIN_MARKERS: &[&str] = &["(❯❯❯)", "(❯❯)", "(❯)"];

/// How a lookup matched, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchTier {
    Exact,
    /// Event name starts with the query
    Prefix,
    /// Query appears as a whole word (or run of words) inside the name
    WholeWord,
    /// Query appears anywhere inside the name
    Substring,
}

impl MatchTier {
    pub const FUZZY: [MatchTier; 3] = [MatchTier::Prefix, MatchTier::WholeWord, MatchTier::Substring];

    /// Whether normalized `name` matches normalized `query` at this tier.
    pub fn matches(&self, name: &str, query: &str) -> bool {
        match self {
            MatchTier::Exact => name == query,
            MatchTier::Prefix => name.starts_with(query),
            MatchTier::WholeWord => contains_word(name, query),
            MatchTier::Substring => name.contains(query),
        }
    }
}

/// Lowercase, strip chain markers, collapse whitespace.
pub fn normalize_name(name: &str) -> String {
    let mut cleaned = name.to_string();
    for marker in CHAIN_MARKERS {
        cleaned = cleaned.replace(marker, " ");
    }
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// True when `query` occurs in `name` bounded by non-alphanumerics or the ends.
fn contains_word(name: &str, query: &str) -> bool {
    if query.is_empty() {
        return false;
    }
    name.match_indices(query).any(|(start, _)| {
        let end = start + query.len();
        let before = name[..start].chars().next_back();
        let after = name[end..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Dance   LESSON "), "dance lesson");
        assert_eq!(normalize_name("(❯❯❯)Extra  Training"), "extra training");
        assert_eq!(normalize_name("(❯) "), "");
    }

    #[test]
    fn test_contains_word_boundaries() {
        assert!(contains_word("a hearty dinner", "dinner"));
        assert!(contains_word("dinner, then bed", "dinner"));
        assert!(contains_word("new year's resolutions", "year's"));
        assert!(!contains_word("candlelit dinnertime", "dinner"));
        assert!(!contains_word("afterdinner", "dinner"));
        assert!(contains_word("afterdinner dinner", "dinner"));
    }

    #[test]
    fn test_tier_order() {
        assert!(MatchTier::Exact < MatchTier::Prefix);
        assert!(MatchTier::WholeWord < MatchTier::Substring);
    }
}
