//! Word normalization and similarity scoring.
//!
//! Spoken input arrives as a noisy, partial prefix of a script paragraph, so
//! the primary metric is coverage: how much of what was said can be found in
//! a candidate element. Edit-distance similarity is kept for whole phrases.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Borrow;
use std::collections::HashSet;
use std::hash::Hash;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Credit given to a spoken word that only matches fuzzily.
pub const FUZZY_MATCH_CREDIT: f32 = 0.7;
/// Spoken words must be longer than this to count towards coverage.
pub const SCORING_MIN_WORD_LEN: usize = 2;
/// Default threshold for [`phrases_match`].
pub const DEFAULT_PHRASE_THRESHOLD: f32 = 0.7;

const FUZZY_MAX_DIFF_RATIO: f32 = 0.3;
const FUZZY_MAX_LEN_DIFF: usize = 2;
const FUZZY_MIN_WORD_LEN: usize = 3;

static RE_APOSTROPHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"['’‘`´]").unwrap());
static RE_PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s]+").unwrap());

/// Lowercase, strip diacritics and punctuation, collapse whitespace.
///
/// Short tokens are kept; use [`normalize`] for the filtered word list.
pub fn fold(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped: String = lowered.nfd().filter(|ch| !is_combining_mark(*ch)).collect();
    let stripped = RE_APOSTROPHE.replace_all(&stripped, "");
    let stripped = RE_PUNCTUATION.replace_all(&stripped, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized word list, dropping single-character tokens.
pub fn normalize(text: &str) -> Vec<String> {
    normalize_with_min_len(text, 1)
}

/// Normalized word list, dropping tokens with `min_len` characters or fewer.
pub fn normalize_with_min_len(text: &str, min_len: usize) -> Vec<String> {
    fold(text)
        .split(' ')
        .filter(|word| word.chars().count() > min_len)
        .map(str::to_string)
        .collect()
}

/// Tolerant comparison of two normalized words.
///
/// Words of three characters or fewer must match exactly; function words are
/// too short for a mismatch ratio to mean anything.
pub fn fuzzy_word_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let len_diff = a_chars.len().abs_diff(b_chars.len());
    if len_diff > FUZZY_MAX_LEN_DIFF {
        return false;
    }
    if a_chars.len() <= FUZZY_MIN_WORD_LEN || b_chars.len() <= FUZZY_MIN_WORD_LEN {
        return false;
    }

    let mismatches = a_chars
        .iter()
        .zip(b_chars.iter())
        .filter(|(x, y)| x != y)
        .count();
    let differences = mismatches + len_diff;
    let max_len = a_chars.len().max(b_chars.len());
    differences as f32 / max_len as f32 <= FUZZY_MAX_DIFF_RATIO
}

/// Levenshtein distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// `(max_len - distance) / max_len` over folded phrases.
pub fn phrase_similarity(a: &str, b: &str) -> f32 {
    let a = fold(a);
    let b = fold(b);
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein(&a, &b);
    (max_len - distance.min(max_len)) as f32 / max_len as f32
}

pub fn phrases_match(a: &str, b: &str, threshold: f32) -> bool {
    phrase_similarity(a, b) >= threshold
}

/// Fraction of spoken words found in the element, with partial credit for
/// fuzzy hits.
pub fn coverage_similarity(spoken: &[String], element_words: &[String]) -> f32 {
    let element_set: HashSet<&str> = element_words.iter().map(String::as_str).collect();
    coverage_against_set(spoken, &element_set)
}

/// Same as [`coverage_similarity`] against a prebuilt word set.
pub fn coverage_against_set<S>(spoken: &[String], element_set: &HashSet<S>) -> f32
where
    S: Borrow<str> + Eq + Hash,
{
    let scored: Vec<&String> = spoken
        .iter()
        .filter(|word| word.chars().count() > SCORING_MIN_WORD_LEN)
        .collect();
    if scored.is_empty() || element_set.is_empty() {
        return 0.0;
    }

    let credit: f32 = scored
        .iter()
        .map(|word| {
            if element_set.contains(word.as_str()) {
                1.0
            } else if element_set
                .iter()
                .any(|candidate| fuzzy_word_match(word, candidate.borrow()))
            {
                FUZZY_MATCH_CREDIT
            } else {
                0.0
            }
        })
        .sum();

    (credit / scored.len() as f32).clamp(0.0, 1.0)
}
