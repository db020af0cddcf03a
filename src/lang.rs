use crate::error::{RdError, RdResult};

/// Supported target languages and their ISO codes, in stable display order.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("hindi", "hi"),
    ("bengali", "bn"),
    ("telugu", "te"),
    ("marathi", "mr"),
    ("tamil", "ta"),
    ("urdu", "ur"),
    ("gujarati", "gu"),
    ("kannada", "kn"),
    ("malayalam", "ml"),
    ("punjabi", "pa"),
    ("odia", "or"),
    ("oriya", "or"),
    ("assamese", "as"),
];

/// Minimum similarity for fuzzy name matching.
const FUZZY_CUTOFF: f64 = 0.6;

/// Resolves a human language name to its ISO code. Exact lookup after
/// trimming and lowercasing; on miss, the closest table key at or above the
/// fuzzy cutoff wins. Beyond that the name is unsupported.
pub fn resolve_language_code(name: &str) -> RdResult<&'static str> {
    let normalized = name.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(RdError::UnsupportedLanguage(name.to_owned()));
    }

    for (key, code) in LANGUAGES {
        if *key == normalized {
            return Ok(code);
        }
    }

    let mut best: Option<(&'static str, f64)> = None;
    for (key, code) in LANGUAGES {
        let score = sequence_ratio(&normalized, key);
        if score >= FUZZY_CUTOFF && best.is_none_or(|(_, prev)| score > prev) {
            best = Some((code, score));
        }
    }

    match best {
        Some((code, _)) => Ok(code),
        None => Err(RdError::UnsupportedLanguage(name.to_owned())),
    }
}

/// Ratcliff/Obershelp similarity of two strings: twice the total length of
/// recursively matched blocks over the combined length.
fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = matching_chars(&a, &b);
    2.0 * matched as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (a_start, b_start, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..a_start], &b[..b_start])
        + matching_chars(&a[a_start + len..], &b[b_start + len..])
}

fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    for i in 0..a.len() {
        for j in 0..b.len() {
            let mut len = 0;
            while i + len < a.len() && j + len < b.len() && a[i + len] == b[j + len] {
                len += 1;
            }
            if len > best.2 {
                best = (i, j, len);
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_names_resolve() {
        assert_eq!(resolve_language_code("hindi").unwrap(), "hi");
        assert_eq!(resolve_language_code("tamil").unwrap(), "ta");
        assert_eq!(resolve_language_code("assamese").unwrap(), "as");
    }

    #[test]
    fn lookup_is_case_and_whitespace_insensitive() {
        assert_eq!(resolve_language_code("  Hindi ").unwrap(), "hi");
        assert_eq!(resolve_language_code("TELUGU").unwrap(), "te");
    }

    #[test]
    fn oriya_and_odia_share_a_code() {
        assert_eq!(resolve_language_code("odia").unwrap(), "or");
        assert_eq!(resolve_language_code("oriya").unwrap(), "or");
    }

    #[test]
    fn near_miss_resolves_fuzzily() {
        // "hindii" vs "hindi": 2 * 5 / 11 = 0.909
        assert_eq!(resolve_language_code("hindii").unwrap(), "hi");
        assert_eq!(resolve_language_code("bengalli").unwrap(), "bn");
        assert_eq!(resolve_language_code("malayalm").unwrap(), "ml");
    }

    #[test]
    fn unrelated_name_is_unsupported() {
        let err = resolve_language_code("xklmno").expect_err("should fail");
        assert!(err.to_string().contains("xklmno"));
        assert!(matches!(err, RdError::UnsupportedLanguage(_)));
    }

    #[test]
    fn empty_name_is_unsupported() {
        assert!(resolve_language_code("").is_err());
        assert!(resolve_language_code("   ").is_err());
    }

    #[test]
    fn ratio_matches_known_values() {
        assert!((sequence_ratio("hindii", "hindi") - 10.0 / 11.0).abs() < 1e-9);
        assert!((sequence_ratio("abc", "abc") - 1.0).abs() < 1e-9);
        assert_eq!(sequence_ratio("abc", "xyz"), 0.0);
        assert_eq!(sequence_ratio("", ""), 1.0);
    }

    #[test]
    fn ratio_counts_blocks_recursively() {
        // "abxcd" vs "abycd": blocks "ab" and "cd", 2 * 4 / 10 = 0.8.
        assert!((sequence_ratio("abxcd", "abycd") - 0.8).abs() < 1e-9);
    }
}
