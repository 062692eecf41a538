//! Text normalization and fingerprinting.
//!
//! Normalized text is what the dedup ledger compares; cleaned text is what
//! the classification service receives. The two differ only in case and URL
//! handling so that identical messages rendered with different links or
//! capitalization collapse to one submission.

use lazy_static::lazy_static;
use regex::Regex;

/// Placeholder substituted for every URL during normalization
pub const URL_PLACEHOLDER: &str = "[url]";

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();

    // Scheme URLs and bare www. hosts
    static ref URL: Regex = Regex::new(r"(?i)\b(?:https?://|www\.)[^\s<>]+").unwrap();
}

/// Collapse whitespace runs to a single space and trim, preserving case
pub fn clean(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Lowercase, replace URLs with a placeholder, collapse whitespace, trim
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let without_urls = URL.replace_all(&lowered, URL_PLACEHOLDER);
    clean(&without_urls)
}

/// Deterministic, order-sensitive 64-bit FNV-1a hash of normalized text
pub fn fingerprint(normalized: &str) -> u64 {
    normalized.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
    })
}

/// Fingerprint raw text in one step
pub fn fingerprint_text(text: &str) -> u64 {
    fingerprint(&normalize(text))
}

/// Length in characters, the unit every text bound is expressed in
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Check whether a string contains a URL anywhere
pub fn contains_url(text: &str) -> bool {
    URL.is_match(text)
}
