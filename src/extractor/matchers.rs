//! Declarative structural matchers.
//!
//! A matcher recognizes a likely content container (a chat message, a feed
//! post, a comment, an article) from node attributes alone. Matchers are plain
//! data so hosts can extend the list without touching traversal code.

use crate::tree::NodeInfo;

/// A named predicate over node kind, role, class and id strings.
///
/// A node matches when any listed dimension matches: kinds and roles compare
/// exactly (case-insensitive), class and id fragments are substrings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralMatcher {
    pub name: &'static str,
    /// Lower values are tried first
    pub priority: u8,
    pub kinds: &'static [&'static str],
    pub roles: &'static [&'static str],
    pub class_fragments: &'static [&'static str],
    pub id_fragments: &'static [&'static str],
}

impl StructuralMatcher {
    pub fn matches(&self, info: &NodeInfo) -> bool {
        let kind = info.kind.to_lowercase();
        if self.kinds.contains(&kind.as_str()) {
            return true;
        }

        if let Some(role) = &info.role {
            if self.roles.contains(&role.to_lowercase().as_str()) {
                return true;
            }
        }

        let class_name = info.class_name.to_lowercase();
        if !class_name.is_empty() && self.class_fragments.iter().any(|f| class_name.contains(f)) {
            return true;
        }

        let element_id = info.element_id.to_lowercase();
        !element_id.is_empty() && self.id_fragments.iter().any(|f| element_id.contains(f))
    }
}

/// Built-in container shapes
pub const DEFAULT_MATCHERS: &[StructuralMatcher] = &[
    StructuralMatcher {
        name: "message",
        priority: 10,
        kinds: &[],
        roles: &[],
        class_fragments: &["message", "msg-body", "chat-bubble", "conversation-item"],
        id_fragments: &["message-"],
    },
    StructuralMatcher {
        name: "post",
        priority: 20,
        kinds: &[],
        roles: &[],
        class_fragments: &["post-body", "post-content", "tweet", "status-update", "feed-item"],
        id_fragments: &["post-"],
    },
    StructuralMatcher {
        name: "comment",
        priority: 30,
        kinds: &[],
        roles: &["comment"],
        class_fragments: &["comment", "reply-body"],
        id_fragments: &["comment-"],
    },
    StructuralMatcher {
        name: "article",
        priority: 40,
        kinds: &["article"],
        roles: &["article"],
        class_fragments: &["article-body", "entry-content"],
        id_fragments: &[],
    },
];

/// Priority-ordered matcher list
#[derive(Debug, Clone)]
pub struct MatcherSet {
    matchers: Vec<StructuralMatcher>,
}

impl MatcherSet {
    pub fn new(mut matchers: Vec<StructuralMatcher>) -> Self {
        matchers.sort_by_key(|m| m.priority);
        Self { matchers }
    }

    /// A set with no matchers; extraction falls back to text heuristics only
    pub fn empty() -> Self {
        Self {
            matchers: Vec::new(),
        }
    }

    /// Add a matcher, keeping priority order (stable for equal priorities)
    pub fn add(&mut self, matcher: StructuralMatcher) {
        let index = self
            .matchers
            .iter()
            .position(|m| m.priority > matcher.priority)
            .unwrap_or(self.matchers.len());
        self.matchers.insert(index, matcher);
    }

    /// First matcher, in priority order, that recognizes the node
    pub fn first_match(&self, info: &NodeInfo) -> Option<&StructuralMatcher> {
        self.matchers.iter().find(|m| m.matches(info))
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Default for MatcherSet {
    fn default() -> Self {
        Self::new(DEFAULT_MATCHERS.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(kind: &str, class_name: &str) -> NodeInfo {
        let mut info = NodeInfo::new(kind);
        info.class_name = class_name.to_string();
        info
    }

    #[test]
    fn test_default_matchers_sorted() {
        let set = MatcherSet::default();
        assert_eq!(set.len(), DEFAULT_MATCHERS.len());
        let priorities: Vec<u8> = set.matchers.iter().map(|m| m.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort();
        assert_eq!(priorities, sorted);
    }

    #[test]
    fn test_match_by_class_fragment() {
        let set = MatcherSet::default();
        let matched = set.first_match(&info("div", "ChatMessage incoming"));
        assert_eq!(matched.map(|m| m.name), Some("message"));

        let matched = set.first_match(&info("li", "user-comment"));
        assert_eq!(matched.map(|m| m.name), Some("comment"));

        assert!(set.first_match(&info("div", "layout-grid")).is_none());
    }

    #[test]
    fn test_match_by_kind_and_role() {
        let set = MatcherSet::default();
        assert_eq!(set.first_match(&info("ARTICLE", "")).map(|m| m.name), Some("article"));

        let mut node = NodeInfo::new("div");
        node.role = Some("Comment".to_string());
        assert_eq!(set.first_match(&node).map(|m| m.name), Some("comment"));
    }

    #[test]
    fn test_priority_wins_on_multiple_matches() {
        let set = MatcherSet::default();
        // Matches both "message" and "article"
        let matched = set.first_match(&info("article", "message-row"));
        assert_eq!(matched.map(|m| m.name), Some("message"));
    }

    #[test]
    fn test_add_custom_matcher() {
        let mut set = MatcherSet::empty();
        assert!(set.is_empty());
        set.add(StructuralMatcher {
            name: "review",
            priority: 50,
            kinds: &[],
            roles: &[],
            class_fragments: &["review"],
            id_fragments: &[],
        });
        set.add(StructuralMatcher {
            name: "sms",
            priority: 5,
            kinds: &["sms"],
            roles: &[],
            class_fragments: &[],
            id_fragments: &[],
        });

        assert_eq!(set.matchers[0].name, "sms");
        assert_eq!(set.first_match(&info("div", "product-review")).map(|m| m.name), Some("review"));
    }
}
