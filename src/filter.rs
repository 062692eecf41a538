//! Content filtering.
//!
//! This module decides which nodes are worth looking at and which text is
//! worth sending for classification:
//! - Node predicate: non-content element kinds, page chrome roles, chrome
//!   vocabulary in class/id strings, configured glob patterns, and this
//!   engine's own annotations
//! - Text predicate: length bounds, boilerplate, word count, bare URLs

use crate::config::FilterConfig;
use crate::text;
use crate::tree::NodeInfo;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{trace, warn};

/// Element kinds that never hold readable content
pub const EXCLUDED_KINDS: &[&str] = &[
    "script", "style", "meta", "noscript", "link", "template", "svg", "head", "title", "iframe",
];

/// Structural roles for page chrome
pub const EXCLUDED_ROLES: &[&str] = &["navigation", "banner", "contentinfo", "complementary"];

/// Class/id vocabulary marking UI chrome (matched case-insensitively as substrings)
pub const CHROME_VOCABULARY: &[&str] = &[
    "header",
    "footer",
    "nav",
    "menu",
    "sidebar",
    "button",
    "toolbar",
    "breadcrumb",
];

/// Class/id prefixes used by this engine's own UI; always excluded
pub const OWN_UI_PATTERNS: &[&str] = &["scanner-*", "*content-scanner*"];

lazy_static! {
    // Whole-string boilerplate, tested against normalized text
    static ref BOILERPLATE: Vec<Regex> = vec![
        // Navigation words
        Regex::new(r"^(home|back|next|previous|prev|menu|search|login|log in|sign in|sign up|sign out|log out|logout|settings|profile|more|close|open|share|reply|like|follow|subscribe)$").unwrap(),
        // Calls to action
        Regex::new(r"^(click|tap|press) here( to [a-z ]+)?[.!]*$").unwrap(),
        Regex::new(r"^(read|see|show|view|load) (more|less|all)( [a-z]+)?[.!]*$").unwrap(),
        Regex::new(r"^(learn more|continue reading|accept( all)?( cookies)?|got it)[.!]*$").unwrap(),
        // Clock times
        Regex::new(r"^\d{1,2}:\d{2}(:\d{2})?( ?[ap]\.?m\.?)?$").unwrap(),
        // Date stamps
        Regex::new(r"^\d{1,4}[/.-]\d{1,2}[/.-]\d{1,4}$").unwrap(),
        Regex::new(r"^(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]* \d{1,2},? \d{4}$").unwrap(),
        Regex::new(r"^\d+ (second|minute|hour|day|week|month|year)s? ago$").unwrap(),
        // Social engagement counts
        Regex::new(r"^[\d.,]+[km]? (likes?|comments?|shares?|views?|replies|reply|retweets?|reactions?|followers?)$").unwrap(),
        // Copyright lines
        Regex::new(r"^(©|\(c\)|copyright)\s.*$").unwrap(),
        // Legal and policy boilerplate
        Regex::new(r"^(privacy policy|terms of (service|use)|cookie policy|all rights reserved|terms and conditions)[.!]*$").unwrap(),
        // Pure punctuation or symbols
        Regex::new(r"^[\p{P}\p{S}\s]*$").unwrap(),
    ];

    static ref BARE_URL: Regex = Regex::new(r"(?i)^(?:https?://|www\.)\S+$").unwrap();

    static ref OWN_UI: Vec<glob::Pattern> = OWN_UI_PATTERNS
        .iter()
        .map(|pattern| glob::Pattern::new(pattern).unwrap())
        .collect();
}

/// Node and text predicates applied during extraction
pub struct FilterPolicy {
    config: FilterConfig,
    /// Compiled patterns for excluded class/id strings
    excluded_patterns: Vec<glob::Pattern>,
}

impl FilterPolicy {
    /// Create a new filter policy with the given configuration
    pub fn new(config: FilterConfig) -> Self {
        let excluded_patterns = config
            .excluded_patterns
            .iter()
            .filter_map(|pattern| {
                glob::Pattern::new(&pattern.to_lowercase())
                    .map_err(|e| {
                        warn!("Invalid excluded pattern '{}': {}", pattern, e);
                        e
                    })
                    .ok()
            })
            .collect();

        Self {
            config,
            excluded_patterns,
        }
    }

    /// Longest text `accepts_text` lets through, in characters
    pub fn max_text_len(&self) -> usize {
        self.config.max_text_len
    }

    /// Check whether a node (and therefore its subtree) may hold content
    pub fn accepts_node(&self, info: &NodeInfo) -> bool {
        if info.is_annotation {
            return false;
        }

        let kind = info.kind.to_lowercase();
        if EXCLUDED_KINDS.contains(&kind.as_str()) {
            trace!("Rejected node kind '{}'", kind);
            return false;
        }

        if let Some(role) = &info.role {
            if EXCLUDED_ROLES.contains(&role.to_lowercase().as_str()) {
                trace!("Rejected role '{}'", role);
                return false;
            }
        }

        let class_name = info.class_name.to_lowercase();
        let element_id = info.element_id.to_lowercase();
        for attr in [&class_name, &element_id] {
            if attr.is_empty() {
                continue;
            }
            if Self::is_own_ui(attr) {
                return false;
            }
            if let Some(word) = CHROME_VOCABULARY.iter().find(|w| attr.contains(*w)) {
                trace!("Rejected chrome attribute '{}' ({})", attr, word);
                return false;
            }
            if self.excluded_patterns.iter().any(|p| p.matches(attr)) {
                trace!("Rejected by configured pattern '{}'", attr);
                return false;
            }
        }

        true
    }

    /// Check a class or id string against this engine's own UI names
    pub fn is_own_ui(attr: &str) -> bool {
        OWN_UI.iter().any(|pattern| pattern.matches(attr))
    }

    /// Check whether text is worth classifying
    pub fn accepts_text(&self, raw: &str) -> bool {
        let cleaned = text::clean(raw);
        let len = text::char_len(&cleaned);
        if len < self.config.min_text_len || len > self.config.max_text_len {
            return false;
        }

        let normalized = text::normalize(&cleaned);
        if is_boilerplate(&normalized) {
            trace!("Rejected boilerplate '{}'", normalized);
            return false;
        }

        if BARE_URL.is_match(&cleaned) {
            return false;
        }

        count_words(&cleaned) >= self.config.min_words
    }
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

/// Check normalized text against the boilerplate list
pub fn is_boilerplate(normalized: &str) -> bool {
    BOILERPLATE.iter().any(|re| re.is_match(normalized))
}

/// Words longer than two characters
fn count_words(text: &str) -> usize {
    text.split_whitespace()
        .filter(|word| word.chars().filter(|c| c.is_alphanumeric()).count() > 2)
        .count()
}
