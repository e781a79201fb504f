//! Fuzzy string similarity on a 0–100 scale.
//!
//! The base measure is Sørensen–Dice bigram overlap from `strsim`. On top of it
//! sit the usual fuzzy-matching refinements: partial (best substring window),
//! token-sort and token-set ratios, combined by [`weighted_ratio`] with length
//! dependent scaling. Identical strings score 100; strings without shared
//! bigrams score 0.

use std::collections::BTreeSet;

const UNBASE_SCALE: f64 = 0.95;
const PARTIAL_SCALE: f64 = 0.9;
const LONG_PARTIAL_SCALE: f64 = 0.6;

/// Lowercase, turn every non-alphanumeric character into a space and collapse
/// runs of whitespace.
pub fn normalize(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity of two normalized strings in `[0.0, 100.0]`.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::sorensen_dice(a, b) * 100.0
}

/// Best [`ratio`] of the shorter string against every equal-length window of
/// the longer one.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (short, long) = if a_chars.len() <= b_chars.len() {
        (a_chars, b_chars)
    } else {
        (b_chars, a_chars)
    };
    if short.len() == long.len() {
        return ratio(a, b);
    }

    let needle: String = short.iter().collect();
    long.windows(short.len())
        .map(|window| ratio(&needle, &window.iter().collect::<String>()))
        .fold(0.0, f64::max)
}

fn sorted_tokens(text: &str) -> String {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Ratio of the strings with their tokens sorted.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn token_set_with(a: &str, b: &str, measure: fn(&str, &str) -> f64) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();

    let join = |tokens: Vec<&str>| tokens.join(" ");
    let sect = join(tokens_a.intersection(&tokens_b).copied().collect());
    let diff_ab = join(tokens_a.difference(&tokens_b).copied().collect());
    let diff_ba = join(tokens_b.difference(&tokens_a).copied().collect());

    let combined_ab = format!("{} {}", sect, diff_ab).trim().to_string();
    let combined_ba = format!("{} {}", sect, diff_ba).trim().to_string();

    measure(&sect, &combined_ab)
        .max(measure(&sect, &combined_ba))
        .max(measure(&combined_ab, &combined_ba))
}

/// Compare the shared tokens against each side's full token set.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    token_set_with(a, b, ratio)
}

/// Combined score of two normalized strings, rounded to an integer.
pub fn weighted_ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let len_a = a.chars().count() as f64;
    let len_b = b.chars().count() as f64;
    let len_ratio = len_a.max(len_b) / len_a.min(len_b);
    let base = ratio(a, b);

    let best = if len_ratio < 1.5 {
        base.max(token_sort_ratio(a, b) * UNBASE_SCALE)
            .max(token_set_ratio(a, b) * UNBASE_SCALE)
    } else {
        let partial_scale = if len_ratio < 8.0 {
            PARTIAL_SCALE
        } else {
            LONG_PARTIAL_SCALE
        };
        let sorted_a = sorted_tokens(a);
        let sorted_b = sorted_tokens(b);
        base.max(partial_ratio(a, b) * partial_scale)
            .max(partial_ratio(&sorted_a, &sorted_b) * UNBASE_SCALE * partial_scale)
            .max(token_set_with(a, b, partial_ratio) * UNBASE_SCALE * partial_scale)
    };

    best.round().clamp(0.0, 100.0) as u8
}

/// Normalize both strings and score them.
pub fn score(query: &str, choice: &str) -> u8 {
    weighted_ratio(&normalize(query), &normalize(choice))
}
